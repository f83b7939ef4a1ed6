//! PeerTransport-Abstraktion
//!
//! Das Mesh verwaltet WER mit wem verbunden ist; WIE eine Peer-Verbindung
//! zustande kommt (SDP, ICE, Medien-Pfade) steckt hinter diesen Traits.
//! Die Verhandlungs-Payloads bleiben fuer das Mesh opak (`SignalDaten`),
//! es reicht sie nur zwischen Signal-Verbindung und Transport durch.

use async_trait::async_trait;
use palaver_core::error::Result;
use palaver_core::types::TeilnehmerId;
use palaver_media::{LokaleMedien, RemoteAudio};
use palaver_protocol::envelope::SignalDaten;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Asynchrone Ereignisse eines einzelnen PeerTransports
///
/// Der Transport meldet sie ueber den beim Erstellen uebergebenen Kanal;
/// das Mesh verarbeitet sie in seiner Ereignis-Pumpe.
pub enum TransportEreignis {
    /// Verhandlung abgeschlossen, der entfernte Medien-Strom liegt an
    Verbunden {
        teilnehmer: TeilnehmerId,
        audio: RemoteAudio,
    },
    /// Gegenstelle hat die Verbindung geschlossen
    Geschlossen { teilnehmer: TeilnehmerId },
    /// Transport endgueltig fehlgeschlagen (z.B. ICE-Timeout)
    Fehler {
        teilnehmer: TeilnehmerId,
        grund: String,
    },
}

impl std::fmt::Debug for TransportEreignis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verbunden { teilnehmer, .. } => {
                write!(f, "Verbunden({})", teilnehmer)
            }
            Self::Geschlossen { teilnehmer } => write!(f, "Geschlossen({})", teilnehmer),
            Self::Fehler { teilnehmer, grund } => {
                write!(f, "Fehler({}, {})", teilnehmer, grund)
            }
        }
    }
}

/// Eine einzelne Peer-Verbindung aus Sicht des Meshs
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Erzeugt das lokale Offer (Initiator-Seite)
    async fn offer_erzeugen(&self) -> Result<SignalDaten>;

    /// Wendet ein entferntes Offer an und erzeugt die Answer
    /// (Responder-Seite)
    async fn offer_anwenden(&self, signal: SignalDaten) -> Result<SignalDaten>;

    /// Wendet die entfernte Answer an (Initiator-Seite)
    async fn answer_anwenden(&self, signal: SignalDaten) -> Result<()>;

    /// Fuegt einen entfernten ICE-Kandidaten hinzu
    async fn kandidat_hinzufuegen(&self, signal: SignalDaten) -> Result<()>;

    /// Schliesst den Transport; idempotent
    async fn schliessen(&self);
}

/// Fabrik fuer PeerTransports
///
/// Die Produktions-Implementierung erstellt echte Peer-Verbindungen;
/// Tests injizieren eine Fabrik mit skriptbaren Transports.
#[async_trait]
pub trait PeerTransportFabrik: Send + Sync {
    /// Erstellt einen Transport zum gegebenen Teilnehmer.
    ///
    /// `medien` ist das geteilte Handle auf die lokale Aufnahme;
    /// `ereignisse` meldet asynchrone Zustandswechsel an das Mesh.
    async fn erstellen(
        &self,
        teilnehmer: TeilnehmerId,
        medien: LokaleMedien,
        ereignisse: mpsc::Sender<TransportEreignis>,
    ) -> Result<Arc<dyn PeerTransport>>;
}
