//! palaver-mesh – Peer-Mesh einer Voice-Session
//!
//! Dieses Crate implementiert:
//! - PeerLink: Zustandsmaschine Neu -> Verhandeln -> Verbunden -> Geschlossen
//! - PeerMesh: Praesenz-Abgleich, Offer/Answer/ICE-Weiterleitung,
//!   Fehler-Isolation pro Link
//! - PeerTransport/PeerTransportFabrik: Seam fuer die echte Peer-Verbindung
//! - AudioSenke: Abspiel-Seite fuer entfernte Stroeme
//!
//! Die Verhandlungs-Payloads (SDP, ICE) bleiben opak; das Mesh kennt nur
//! die Reihenfolge der Schritte, nie den Inhalt.

pub mod link;
pub mod mesh;
pub mod senke;
pub mod transport;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use link::{LinkZustand, PeerLink, Rolle};
pub use mesh::PeerMesh;
pub use senke::{AudioSenke, PraesenzSenke};
pub use transport::{PeerTransport, PeerTransportFabrik, TransportEreignis};
