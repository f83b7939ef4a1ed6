//! Voice-Sitzung – buendelt alle Ressourcen eines Voice-Beitritts
//!
//! Eine Sitzung besteht aus der Voice-Signal-Verbindung, dem Peer-Mesh
//! und der laufenden Ereignis-Pumpe. Der Abbau laeuft immer ueber
//! denselben Pfad, egal ob lokal verlassen, ersetzt oder vom Server
//! getrennt: Verbindung stoppen, Links schliessen, Roster leeren,
//! Medien freigeben.

use std::sync::Arc;
use tracing::info;

use palaver_core::types::KanalId;
use palaver_media::MedienWaechter;
use palaver_mesh::PeerMesh;
use palaver_store::StoreBridge;

use crate::router::SignalRouter;
use crate::verbindung::KanalVerbindung;

/// Laufende Voice-Sitzung
pub struct VoiceSitzung {
    pub(crate) generation: u64,
    kanal: KanalId,
    verbindung: KanalVerbindung,
    mesh: Arc<PeerMesh>,
    pumpe: tokio::task::JoinHandle<()>,
}

impl VoiceSitzung {
    pub(crate) fn neu(
        generation: u64,
        kanal: KanalId,
        verbindung: KanalVerbindung,
        mesh: Arc<PeerMesh>,
        pumpe: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            generation,
            kanal,
            verbindung,
            mesh,
            pumpe,
        }
    }

    /// Kanal dieser Sitzung
    pub fn kanal(&self) -> KanalId {
        self.kanal
    }

    /// Peer-Mesh dieser Sitzung
    pub fn mesh(&self) -> &Arc<PeerMesh> {
        &self.mesh
    }

    /// Baut die Sitzung vollstaendig ab.
    ///
    /// Der einzige Abbau-Pfad; wird von Verlassen, Ersetzen und
    /// Remote-Trennung gleichermassen benutzt.
    pub(crate) async fn abbauen(
        self,
        router: &SignalRouter,
        waechter: &MedienWaechter,
        bridge: &StoreBridge,
    ) {
        self.verbindung.stoppen();
        self.mesh.alle_schliessen().await;
        router.mesh_entfernen();
        bridge.roster_leeren();
        waechter.freigeben();
        self.pumpe.abort();
        info!(kanal = %self.kanal, "Voice-Sitzung abgebaut");
    }
}
