//! Verbindungs-Manager – eine Text- und eine Voice-Verbindung
//!
//! Der Manager haelt pro Verbindungsart hoechstens eine aktive
//! Verbindung. Ein erneuter Beitritt ersetzt die bestehende Verbindung
//! derselben Art (der letzte Aufrufer gewinnt); beim Ersetzen wird die
//! alte Verbindung zuerst sauber abgebaut.
//!
//! ## Generationen
//! Jeder Beitritt bekommt eine monoton steigende Generation. Der
//! Trenn-Waechter einer Verbindung raeumt nur auf wenn seine Generation
//! noch die aktuelle ist – so kann eine sterbende alte Verbindung nie
//! die neue abbauen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};

use palaver_core::error::{PalaverError, Result};
use palaver_core::event::KlientEreignis;
use palaver_core::types::{KanalId, TeilnehmerId, Verbindungsart};
use palaver_media::MedienWaechter;
use palaver_mesh::{AudioSenke, PeerMesh, PeerTransportFabrik, PraesenzSenke};
use palaver_protocol::envelope::SignalEnvelope;
use palaver_store::StoreBridge;

use crate::router::{EnvelopeRouter, SignalRouter};
use crate::sitzung::VoiceSitzung;
use crate::transport::Verbinder;
use crate::verbindung::KanalVerbindung;
use crate::ws::kanal_url;

/// Kapazitaet des Ereignis-Broadcasts
const EREIGNIS_KAPAZITAET: usize = 64;

/// Verbindungsdaten des Klienten
#[derive(Debug, Clone)]
pub struct ManagerKonfig {
    /// Basis-URL des Directory Service, z.B. `ws://localhost:8000`
    pub basis_url: String,
    /// Auth-Token (wird als Query-Parameter mitgegeben)
    pub token: String,
    /// Eigene Teilnehmer-ID (bestimmt die Initiator-Rolle im Mesh)
    pub lokale_id: TeilnehmerId,
}

/// Fuehrt den Voice-Roster der Bruecke nach wenn ein Link ausserhalb
/// eines Praesenz-Updates stirbt
struct RosterNachfuehrung {
    bridge: Arc<StoreBridge>,
}

impl PraesenzSenke for RosterNachfuehrung {
    fn teilnehmer_weggefallen(&self, teilnehmer: TeilnehmerId) {
        self.bridge.teilnehmer_weggefallen(teilnehmer);
    }
}

/// Aktive Text-Verbindung samt Generation
struct AktiverKanal {
    generation: u64,
    verbindung: KanalVerbindung,
}

/// Verwaltet die beiden Signal-Verbindungen des Klienten
pub struct VerbindungsManager {
    konfig: ManagerKonfig,
    verbinder: Arc<dyn Verbinder>,
    router: Arc<SignalRouter>,
    bridge: Arc<StoreBridge>,
    waechter: Arc<MedienWaechter>,
    fabrik: Arc<dyn PeerTransportFabrik>,
    senke: Arc<dyn AudioSenke>,
    generationen: AtomicU64,
    text: Mutex<Option<AktiverKanal>>,
    voice: Mutex<Option<VoiceSitzung>>,
    ereignisse: broadcast::Sender<KlientEreignis>,
}

impl VerbindungsManager {
    /// Erstellt den Manager; verbindet noch nichts
    pub fn neu(
        konfig: ManagerKonfig,
        verbinder: Arc<dyn Verbinder>,
        bridge: Arc<StoreBridge>,
        waechter: Arc<MedienWaechter>,
        fabrik: Arc<dyn PeerTransportFabrik>,
        senke: Arc<dyn AudioSenke>,
    ) -> Arc<Self> {
        let router = Arc::new(SignalRouter::neu(Arc::clone(&bridge)));
        let (ereignisse, _) = broadcast::channel(EREIGNIS_KAPAZITAET);
        Arc::new(Self {
            konfig,
            verbinder,
            router,
            bridge,
            waechter,
            fabrik,
            senke,
            generationen: AtomicU64::new(0),
            text: Mutex::new(None),
            voice: Mutex::new(None),
            ereignisse,
        })
    }

    /// Abonniert die Klient-Ereignisse
    pub fn ereignisse(&self) -> broadcast::Receiver<KlientEreignis> {
        self.ereignisse.subscribe()
    }

    /// Router dieses Managers (fuer die Verdrahtung der UI-Schicht)
    pub fn router(&self) -> &Arc<SignalRouter> {
        &self.router
    }

    // -----------------------------------------------------------------------
    // Text-Verbindung
    // -----------------------------------------------------------------------

    /// Tritt einem Text-Kanal bei; ersetzt eine bestehende Text-Verbindung
    pub async fn text_beitreten(self: &Arc<Self>, kanal: KanalId) -> Result<()> {
        let generation = self.naechste_generation();
        let mut slot = self.text.lock().await;

        if let Some(alt) = slot.take() {
            let alt_kanal = alt.verbindung.kanal();
            alt.verbindung.stoppen();
            self.melden(KlientEreignis::VerbindungGetrennt {
                art: Verbindungsart::Text,
                kanal_id: alt_kanal,
                grund: "Durch neuen Beitritt ersetzt".into(),
            });
        }

        let url = kanal_url(
            &self.konfig.basis_url,
            Verbindungsart::Text,
            kanal,
            &self.konfig.token,
        );
        let transport = self.verbinder.verbinden(&url).await?;
        let (verbindung, beendet) = KanalVerbindung::starten(
            transport,
            Arc::clone(&self.router) as Arc<dyn EnvelopeRouter>,
            Verbindungsart::Text,
            kanal,
        );

        *slot = Some(AktiverKanal {
            generation,
            verbindung,
        });
        drop(slot);

        self.text_trenn_waechter(generation, kanal, beendet);
        info!(kanal = %kanal, "Text-Kanal beigetreten");
        self.melden(KlientEreignis::VerbindungOffen {
            art: Verbindungsart::Text,
            kanal_id: kanal,
        });
        Ok(())
    }

    /// Verlaesst den Text-Kanal; No-Op ohne Verbindung, wirft nie
    pub async fn text_verlassen(&self) {
        let mut slot = self.text.lock().await;
        if let Some(aktiv) = slot.take() {
            let kanal = aktiv.verbindung.kanal();
            aktiv.verbindung.stoppen();
            drop(slot);
            info!(kanal = %kanal, "Text-Kanal verlassen");
            self.melden(KlientEreignis::VerbindungGetrennt {
                art: Verbindungsart::Text,
                kanal_id: kanal,
                grund: "Lokal verlassen".into(),
            });
        }
    }

    /// Sendet eine Chat-Nachricht ueber die Text-Verbindung
    pub async fn nachricht_senden(&self, inhalt: impl Into<String>) -> Result<()> {
        let slot = self.text.lock().await;
        let Some(aktiv) = slot.as_ref() else {
            return Err(PalaverError::NichtVerbunden(
                "Kein Text-Kanal beigetreten".into(),
            ));
        };
        aktiv.verbindung.senden(SignalEnvelope::chat_senden(inhalt))
    }

    /// Kanal der aktiven Text-Verbindung
    pub async fn text_kanal(&self) -> Option<KanalId> {
        self.text.lock().await.as_ref().map(|a| a.verbindung.kanal())
    }

    // -----------------------------------------------------------------------
    // Voice-Verbindung
    // -----------------------------------------------------------------------

    /// Tritt einem Voice-Kanal bei.
    ///
    /// Die lokalen Medien werden VOR dem Verbinden erworben: scheitert
    /// der Erwerb, wird gar nicht erst verbunden und kein Teilzustand
    /// bleibt zurueck. Eine bestehende Voice-Sitzung wird ersetzt.
    pub async fn voice_beitreten(self: &Arc<Self>, kanal: KanalId) -> Result<()> {
        let generation = self.naechste_generation();
        let mut slot = self.voice.lock().await;

        if let Some(alt) = slot.take() {
            let alt_kanal = alt.kanal();
            alt.abbauen(&self.router, &self.waechter, &self.bridge).await;
            self.melden(KlientEreignis::VerbindungGetrennt {
                art: Verbindungsart::Voice,
                kanal_id: alt_kanal,
                grund: "Durch neuen Beitritt ersetzt".into(),
            });
        }

        // Medien zuerst
        let medien = self
            .waechter
            .erwerben()
            .map_err(|e| PalaverError::MedienNichtVerfuegbar(e.to_string()))?;

        let url = kanal_url(
            &self.konfig.basis_url,
            Verbindungsart::Voice,
            kanal,
            &self.konfig.token,
        );
        let transport = match self.verbinder.verbinden(&url).await {
            Ok(t) => t,
            Err(e) => {
                // Kein Teilzustand: Medien wieder freigeben
                self.waechter.freigeben();
                return Err(e);
            }
        };

        let (verbindung, beendet) = KanalVerbindung::starten(
            transport,
            Arc::clone(&self.router) as Arc<dyn EnvelopeRouter>,
            Verbindungsart::Voice,
            kanal,
        );
        let mesh = Arc::new(PeerMesh::neu(
            self.konfig.lokale_id,
            medien,
            Arc::clone(&self.fabrik),
            Arc::clone(&self.senke),
            Arc::new(RosterNachfuehrung {
                bridge: Arc::clone(&self.bridge),
            }),
            verbindung.ausgang(),
        ));
        let pumpe = mesh.ereignis_pumpe_starten();
        self.router.mesh_setzen(Arc::clone(&mesh));

        *slot = Some(VoiceSitzung::neu(generation, kanal, verbindung, mesh, pumpe));
        drop(slot);

        self.voice_trenn_waechter(generation, kanal, beendet);
        info!(kanal = %kanal, "Voice-Kanal beigetreten");
        self.melden(KlientEreignis::VerbindungOffen {
            art: Verbindungsart::Voice,
            kanal_id: kanal,
        });
        Ok(())
    }

    /// Verlaesst den Voice-Kanal; No-Op ohne Sitzung, wirft nie
    pub async fn voice_verlassen(&self) {
        let mut slot = self.voice.lock().await;
        if let Some(sitzung) = slot.take() {
            let kanal = sitzung.kanal();
            sitzung
                .abbauen(&self.router, &self.waechter, &self.bridge)
                .await;
            drop(slot);
            self.melden(KlientEreignis::VerbindungGetrennt {
                art: Verbindungsart::Voice,
                kanal_id: kanal,
                grund: "Lokal verlassen".into(),
            });
        }
    }

    /// Mutet bzw. entmutet das lokale Mikrofon (ohne Neuverhandlung)
    pub fn stumm_setzen(&self, stumm: bool) {
        self.waechter.stumm_setzen(stumm);
    }

    /// Kanal der aktiven Voice-Sitzung
    pub async fn voice_kanal(&self) -> Option<KanalId> {
        self.voice.lock().await.as_ref().map(|s| s.kanal())
    }

    /// Verlaesst beide Kanaele (Logout, Shutdown)
    pub async fn alles_verlassen(&self) {
        self.text_verlassen().await;
        self.voice_verlassen().await;
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn naechste_generation(&self) -> u64 {
        self.generationen.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn melden(&self, ereignis: KlientEreignis) {
        // Kein Abonnent ist kein Fehler
        let _ = self.ereignisse.send(ereignis);
    }

    /// Raeumt die Text-Verbindung auf sobald ihr Task endet –
    /// aber nur wenn sie noch die aktuelle Generation ist
    fn text_trenn_waechter(
        self: &Arc<Self>,
        generation: u64,
        kanal: KanalId,
        mut beendet: mpsc::Receiver<String>,
    ) {
        let schwach = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(grund) = beendet.recv().await else { return };
            let Some(manager) = schwach.upgrade() else { return };
            let mut slot = manager.text.lock().await;
            if slot.as_ref().map(|a| a.generation) == Some(generation) {
                *slot = None;
                drop(slot);
                manager.melden(KlientEreignis::VerbindungGetrennt {
                    art: Verbindungsart::Text,
                    kanal_id: kanal,
                    grund,
                });
            }
        });
    }

    /// Baut die Voice-Sitzung ab sobald ihr Verbindungs-Task endet –
    /// aber nur wenn sie noch die aktuelle Generation ist
    fn voice_trenn_waechter(
        self: &Arc<Self>,
        generation: u64,
        kanal: KanalId,
        mut beendet: mpsc::Receiver<String>,
    ) {
        let schwach = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(grund) = beendet.recv().await else { return };
            let Some(manager) = schwach.upgrade() else { return };
            let mut slot = manager.voice.lock().await;
            if slot.as_ref().map(|s| s.generation) == Some(generation) {
                let Some(sitzung) = slot.take() else { return };
                sitzung
                    .abbauen(&manager.router, &manager.waechter, &manager.bridge)
                    .await;
                drop(slot);
                warn!(kanal = %kanal, grund = %grund, "Voice-Sitzung unerwartet beendet");
                manager.melden(KlientEreignis::VerbindungGetrennt {
                    art: Verbindungsart::Voice,
                    kanal_id: kanal,
                    grund,
                });
            }
        });
    }
}
