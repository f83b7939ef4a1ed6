//! Signal-Router – verteilt dekodierte Envelopes an ihre Ziele
//!
//! Text-Envelopes gehen in die Store-Bruecke, Signalisierungs-Envelopes
//! ins Peer-Mesh. Der Router wird von beiden Verbindungs-Tasks geteilt;
//! innerhalb einer Verbindung laeuft die Verteilung strikt sequenziell
//! in Empfangs-Reihenfolge.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use palaver_mesh::PeerMesh;
use palaver_protocol::envelope::SignalEnvelope;
use palaver_store::StoreBridge;

/// Ziel fuer dekodierte Envelopes einer Verbindung
#[async_trait]
pub trait EnvelopeRouter: Send + Sync {
    /// Verteilt ein Envelope; darf nie die Verbindung beenden
    async fn verteilen(&self, envelope: SignalEnvelope);
}

/// Standard-Router ueber Store-Bruecke und (waehrend einer Voice-Session)
/// dem Peer-Mesh
pub struct SignalRouter {
    bridge: Arc<StoreBridge>,
    /// Mesh der laufenden Voice-Session; None ausserhalb einer Session
    mesh: parking_lot::Mutex<Option<Arc<PeerMesh>>>,
}

impl SignalRouter {
    /// Erstellt den Router; das Mesh wird pro Voice-Session gesetzt
    pub fn neu(bridge: Arc<StoreBridge>) -> Self {
        Self {
            bridge,
            mesh: parking_lot::Mutex::new(None),
        }
    }

    /// Hinterlegt das Mesh der frisch gestarteten Voice-Session
    pub fn mesh_setzen(&self, mesh: Arc<PeerMesh>) {
        *self.mesh.lock() = Some(mesh);
    }

    /// Entfernt das Mesh (Session-Ende)
    pub fn mesh_entfernen(&self) {
        *self.mesh.lock() = None;
    }

    fn mesh(&self) -> Option<Arc<PeerMesh>> {
        self.mesh.lock().clone()
    }

    /// Store-Bruecke dieses Routers
    pub fn bridge(&self) -> &Arc<StoreBridge> {
        &self.bridge
    }
}

#[async_trait]
impl EnvelopeRouter for SignalRouter {
    async fn verteilen(&self, envelope: SignalEnvelope) {
        match envelope {
            // Text-Verbindung -> Store-Bruecke
            SignalEnvelope::ChatMessage { data } => self.bridge.chat_empfangen(&data),
            SignalEnvelope::UserJoined { data } => self.bridge.beitritt_empfangen(&data),
            SignalEnvelope::UserLeft { data } => self.bridge.austritt_empfangen(&data),

            // Voice-Verbindung -> Roster + Mesh
            SignalEnvelope::VoiceUsersUpdate { data } => {
                self.bridge.roster_empfangen(&data);
                if let Some(mesh) = self.mesh() {
                    mesh.praesenz_abgleichen(&data.users).await;
                } else {
                    debug!("Praesenz-Update ohne laufende Voice-Session");
                }
            }
            SignalEnvelope::Offer { from, signal, .. } => {
                let (Some(mesh), Some(von)) = (self.mesh(), from) else {
                    warn!("Offer ohne Session oder Absender verworfen");
                    return;
                };
                if let Err(e) = mesh.offer_empfangen(von.id, signal).await {
                    warn!(teilnehmer = %von.id, fehler = %e, "Offer-Verarbeitung fehlgeschlagen");
                }
            }
            SignalEnvelope::Answer { from, signal, .. } => {
                let (Some(mesh), Some(von)) = (self.mesh(), from) else {
                    warn!("Answer ohne Session oder Absender verworfen");
                    return;
                };
                if let Err(e) = mesh.answer_empfangen(von.id, signal).await {
                    warn!(teilnehmer = %von.id, fehler = %e, "Answer-Verarbeitung fehlgeschlagen");
                }
            }
            SignalEnvelope::IceCandidate { from, signal, .. } => {
                let (Some(mesh), Some(von)) = (self.mesh(), from) else {
                    debug!("ICE-Kandidat ohne Session oder Absender verworfen");
                    return;
                };
                mesh.kandidat_empfangen(von.id, signal).await;
            }

            // Beide Verbindungen
            SignalEnvelope::ServerFehler { data } => self.bridge.fehler_empfangen(&data),
        }
    }
}
