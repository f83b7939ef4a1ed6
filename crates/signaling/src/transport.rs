//! Transport-Abstraktion fuer die Signal-Verbindungen
//!
//! Der Verbindungs-Manager arbeitet gegen diese Traits statt direkt
//! gegen tokio-tungstenite; Tests injizieren skriptbare Transports.

use async_trait::async_trait;
use palaver_core::error::Result;

/// Eine offene Signal-Verbindung (Textframe-basiert)
#[async_trait]
pub trait SignalTransport: Send {
    /// Sendet einen Textframe
    async fn senden(&mut self, text: String) -> Result<()>;

    /// Wartet auf den naechsten Textframe.
    ///
    /// `None` bedeutet: die Gegenstelle hat die Verbindung geschlossen.
    async fn empfangen(&mut self) -> Option<Result<String>>;

    /// Schliesst die Verbindung; idempotent
    async fn schliessen(&mut self);
}

/// Stellt Signal-Verbindungen her
#[async_trait]
pub trait Verbinder: Send + Sync {
    /// Verbindet zur gegebenen URL (Handshake inklusive)
    async fn verbinden(&self, url: &str) -> Result<Box<dyn SignalTransport>>;
}
