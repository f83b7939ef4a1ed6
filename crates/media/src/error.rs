//! Fehlertypen fuer die lokale Medien-Erfassung

use thiserror::Error;

/// Fehler bei Erwerb oder Betrieb der lokalen Audio-Aufnahme
#[derive(Debug, Error)]
pub enum MedienFehler {
    /// Aufnahme verweigert oder kein Geraet vorhanden.
    /// Der Voice-Beitritt muss abgebrochen werden, ohne Teilzustand.
    #[error("Lokale Medien nicht verfuegbar: {0}")]
    NichtVerfuegbar(String),

    /// Geraet gefunden, aber der Stream konnte nicht geoeffnet werden
    #[error("Aufnahme-Stream fehlgeschlagen: {0}")]
    Stream(String),
}

/// Result-Typ fuer die Medien-Schicht
pub type MedienResult<T> = Result<T, MedienFehler>;
