//! palaver-media – Lokale Audio-Erfassung
//!
//! Dieses Crate kapselt den exklusiven Besitz der lokalen Medien:
//! - `MedienWaechter`: genau eine aktive Aufnahme, idempotente Freigabe
//! - `LokaleMedien`: geteiltes Handle, Mute als Stille ohne Neuverhandlung
//! - `CpalBackend`: echtes Mikrofon ueber cpal + lock-free Ring-Buffer
//!
//! Tests injizieren ein eigenes `AufnahmeBackend` statt echter Hardware.

pub mod cpal_backend;
pub mod error;
pub mod quelle;
pub mod waechter;

// Bequeme Re-Exporte
pub use cpal_backend::CpalBackend;
pub use error::{MedienFehler, MedienResult};
pub use quelle::{AudioQuelle, PufferQuelle, RemoteAudio};
pub use waechter::{Aufnahme, AufnahmeBackend, AufnahmeKonfig, LokaleMedien, MedienWaechter};
