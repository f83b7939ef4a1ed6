//! palaver-core – Gemeinsame Typen fuer den Palaver-Klient-Kern
//!
//! Enthaelt die ID-Newtypes, die Fehler-Taxonomie des Kerns und die
//! Klient-Ereignisse fuer die UI-Schicht. Alle anderen Crates des
//! Workspace bauen hierauf auf.

pub mod error;
pub mod event;
pub mod types;

// Bequeme Re-Exporte
pub use error::{PalaverError, Result};
pub use event::KlientEreignis;
pub use types::{KanalId, NachrichtenId, TeilnehmerId, Verbindungsart};
