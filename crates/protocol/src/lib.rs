//! palaver-protocol – Wire-Format der Signal-Verbindungen
//!
//! Dieses Crate definiert:
//! - `SignalEnvelope`: typisierte Envelopes fuer Text- und Voice-Verbindung
//! - `codec`: JSON-Textframe-Kodierung mit Vorwaertskompatibilitaet
//!   (unbekannte Typen sind kein Fehler sondern ein No-Op-Signal)
//!
//! Das Format ist durch den Directory Service vorgegeben: ein WebSocket-
//! Textframe traegt genau ein JSON-Objekt mit `type`-Tag.

pub mod codec;
pub mod envelope;

// Bequeme Re-Exporte
pub use codec::{dekodieren, kodieren, CodecFehler};
pub use envelope::{
    ChatNachricht, FehlerMeldung, KanalEreignis, SignalDaten, SignalEnvelope, UserInfo,
    VoiceRoster,
};
