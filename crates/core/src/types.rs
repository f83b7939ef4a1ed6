//! Gemeinsame Identifikationstypen fuer Palaver
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Die IDs sind
//! numerisch (i64) weil der Directory Service sie als Datenbank-IDs vergibt.

use serde::{Deserialize, Serialize};

/// Eindeutige Teilnehmer-ID (vom Directory Service vergeben)
///
/// Total geordnet – die Ordnung wird fuer die Initiator-Regel im
/// Peer-Mesh verwendet (kleinere ID initiiert).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeilnehmerId(pub i64);

impl TeilnehmerId {
    /// Gibt den inneren numerischen Wert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TeilnehmerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "teilnehmer:{}", self.0)
    }
}

impl From<i64> for TeilnehmerId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Eindeutige Kanal-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KanalId(pub i64);

impl KanalId {
    /// Gibt den inneren numerischen Wert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for KanalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kanal:{}", self.0)
    }
}

impl From<i64> for KanalId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Eindeutige Nachrichten-ID (fuer Chat-Deduplizierung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NachrichtenId(pub i64);

impl std::fmt::Display for NachrichtenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "nachricht:{}", self.0)
    }
}

impl From<i64> for NachrichtenId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Art einer Signal-Verbindung: Text- oder Voice-Kanal
///
/// Pro Art existiert hoechstens eine aktive Verbindung (Invariante des
/// Verbindungs-Managers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verbindungsart {
    /// Text-Kanal (Chat-Nachrichten, Join/Leave)
    Text,
    /// Voice-Kanal (Praesenz-Updates, WebRTC-Signalisierung)
    Voice,
}

impl std::fmt::Display for Verbindungsart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verbindungsart::Text => write!(f, "text"),
            Verbindungsart::Voice => write!(f, "voice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teilnehmer_id_ordnung() {
        let a = TeilnehmerId(1);
        let b = TeilnehmerId(2);
        assert!(a < b, "Kleinere ID muss vor der groesseren liegen");
        assert_ne!(a, b);
    }

    #[test]
    fn kanal_id_display() {
        let id = KanalId(42);
        assert_eq!(id.to_string(), "kanal:42");
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let uid = TeilnehmerId(7);
        let json = serde_json::to_string(&uid).unwrap();
        // Transparent: serialisiert als nackte Zahl wie im Wire-Format
        assert_eq!(json, "7");
        let uid2: TeilnehmerId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);
    }

    #[test]
    fn verbindungsart_display() {
        assert_eq!(Verbindungsart::Text.to_string(), "text");
        assert_eq!(Verbindungsart::Voice.to_string(), "voice");
    }
}
