//! Fehlertypen fuer Palaver
//!
//! Zentraler Fehler-Enum nach der Fehler-Taxonomie des Kerns: Transport,
//! Medien, Verhandlung, Protokoll. Kein Fehler in diesem Kern ist fatal –
//! jeder Fehlerzustand degradiert zu einem kleineren, konsistenten Zustand
//! (weniger Peers, keine Voice-Session, getrennt).
//!
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Palaver
pub type Result<T> = std::result::Result<T, PalaverError>;

/// Alle moeglichen Fehlerklassen im Palaver-Kern
#[derive(Debug, Error)]
pub enum PalaverError {
    /// Verbindung fehlgeschlagen oder unerwartet geschlossen.
    /// Wird durch sauberen Abbau behoben, nie automatisch neu verbunden.
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Keine offene Verbindung fuer die angeforderte Operation
    #[error("Nicht verbunden: {0}")]
    NichtVerbunden(String),

    /// Lokale Audio-Aufnahme verweigert oder nicht vorhanden.
    /// Der Voice-Beitritt wird abgebrochen, kein Teilzustand bleibt zurueck.
    #[error("Lokale Medien nicht verfuegbar: {0}")]
    MedienNichtVerfuegbar(String),

    /// Ein einzelner PeerLink konnte die Verhandlung nicht abschliessen.
    /// Betrifft nur diesen Link, nie die Verbindung als Ganzes.
    #[error("Verhandlung mit {teilnehmer} fehlgeschlagen: {grund}")]
    Verhandlung { teilnehmer: String, grund: String },

    /// Fehlerhafte oder unbekannte Nachricht.
    /// Wird geloggt und ignoriert, die Verbindung bleibt offen.
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PalaverError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Aufrufer die Operation sinnvoll
    /// wiederholen kann (z.B. erneuter Join nach Transportfehler)
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NichtVerbunden(_))
    }

    /// Gibt true zurueck wenn der Fehler nur geloggt und ignoriert wird
    /// (die Verbindung bleibt offen)
    pub fn ist_ignorierbar(&self) -> bool {
        matches!(self, Self::Protokoll(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = PalaverError::MedienNichtVerfuegbar("Mikrofon-Zugriff verweigert".into());
        assert_eq!(
            e.to_string(),
            "Lokale Medien nicht verfuegbar: Mikrofon-Zugriff verweigert"
        );
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(PalaverError::Transport("test".into()).ist_wiederholbar());
        assert!(PalaverError::NichtVerbunden("test".into()).ist_wiederholbar());
        assert!(!PalaverError::Protokoll("test".into()).ist_wiederholbar());
    }

    #[test]
    fn protokollfehler_ist_ignorierbar() {
        assert!(PalaverError::Protokoll("unbekannter Typ".into()).ist_ignorierbar());
        assert!(!PalaverError::Transport("weg".into()).ist_ignorierbar());
    }

    #[test]
    fn verhandlungsfehler_nennt_teilnehmer() {
        let e = PalaverError::Verhandlung {
            teilnehmer: "teilnehmer:2".into(),
            grund: "ICE-Timeout".into(),
        };
        assert!(e.to_string().contains("teilnehmer:2"));
        assert!(e.to_string().contains("ICE-Timeout"));
    }
}
