//! palaver-signaling – Signal-Verbindungen zum Directory Service
//!
//! Dieses Crate implementiert:
//! - `Verbinder`/`SignalTransport`: Transport-Seam (WebSocket-Implementierung
//!   via tokio-tungstenite in `ws`)
//! - `KanalVerbindung`: select!-Task pro offener Verbindung, sequenzielle
//!   Verteilung in Empfangs-Reihenfolge
//! - `SignalRouter`: verteilt Envelopes an Store-Bruecke und Peer-Mesh
//! - `VerbindungsManager`: hoechstens eine Text- und eine Voice-Verbindung,
//!   letzter Beitritt gewinnt, Abbau immer ueber denselben Pfad

pub mod manager;
pub mod router;
pub mod sitzung;
pub mod transport;
pub mod verbindung;
pub mod ws;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use manager::{ManagerKonfig, VerbindungsManager};
pub use router::{EnvelopeRouter, SignalRouter};
pub use sitzung::VoiceSitzung;
pub use transport::{SignalTransport, Verbinder};
pub use verbindung::KanalVerbindung;
pub use ws::{kanal_url, WsVerbinder};
