//! palaver-client – Fassade ueber den Palaver-Kern
//!
//! Verdrahtet Konfiguration, Logging, Medien-Waechter, Store-Bruecke und
//! Verbindungs-Manager zu einem einzigen Einstiegspunkt fuer die
//! UI-Schicht. Die UI liefert drei Bausteine selbst:
//! - einen `ZustandsSpeicher` (wohin Chat und Praesenz fliessen)
//! - eine `PeerTransportFabrik` (wie Peer-Verbindungen entstehen)
//! - eine `AudioSenke` (wohin entfernte Stroeme abgespielt werden)
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use palaver_client::{Anmeldung, KlientConfig, PalaverKlient};
//! use palaver_core::types::{KanalId, TeilnehmerId};
//!
//! # fn bausteine() -> (Arc<dyn palaver_store::ZustandsSpeicher>, Arc<dyn palaver_mesh::PeerTransportFabrik>, Arc<dyn palaver_mesh::AudioSenke>) { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = KlientConfig::laden("palaver.toml")?;
//!     palaver_client::logging_initialisieren(&config.logging.level, &config.logging.format);
//!
//!     let (speicher, fabrik, senke) = bausteine();
//!     let klient = PalaverKlient::neu(
//!         &config,
//!         Anmeldung { token: "jwt".into(), teilnehmer_id: TeilnehmerId(1) },
//!         speicher, fabrik, senke,
//!     );
//!
//!     klient.text_beitreten(KanalId(1)).await?;
//!     klient.nachricht_senden("Hallo!").await?;
//!     klient.voice_beitreten(KanalId(42)).await?;
//!     klient.stumm_setzen(true);
//!     klient.alles_verlassen().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;

use std::sync::Arc;
use tokio::sync::broadcast;

use palaver_core::error::Result;
use palaver_core::event::KlientEreignis;
use palaver_core::types::{KanalId, TeilnehmerId};
use palaver_media::{AufnahmeBackend, CpalBackend, MedienWaechter};
use palaver_mesh::{AudioSenke, PeerTransportFabrik};
use palaver_signaling::{ManagerKonfig, Verbinder, VerbindungsManager, WsVerbinder};
use palaver_store::{StoreBridge, ZustandsSpeicher};

pub use config::KlientConfig;
pub use logging::logging_initialisieren;

/// Anmeldedaten nach erfolgreichem Login beim Directory Service
#[derive(Debug, Clone)]
pub struct Anmeldung {
    /// Auth-Token fuer die WebSocket-Endpunkte
    pub token: String,
    /// Eigene Teilnehmer-ID
    pub teilnehmer_id: TeilnehmerId,
}

/// Einstiegspunkt fuer die UI-Schicht
pub struct PalaverKlient {
    manager: Arc<VerbindungsManager>,
    waechter: Arc<MedienWaechter>,
}

impl PalaverKlient {
    /// Erstellt den Klienten mit den Produktions-Bausteinen
    /// (WebSocket-Verbinder, cpal-Mikrofon)
    pub fn neu(
        config: &KlientConfig,
        anmeldung: Anmeldung,
        speicher: Arc<dyn ZustandsSpeicher>,
        fabrik: Arc<dyn PeerTransportFabrik>,
        senke: Arc<dyn AudioSenke>,
    ) -> Self {
        Self::mit_bausteinen(
            config,
            anmeldung,
            Arc::new(WsVerbinder),
            Arc::new(CpalBackend::neu()),
            speicher,
            fabrik,
            senke,
        )
    }

    /// Erstellt den Klienten mit frei waehlbaren Bausteinen
    /// (Einbettungen und Tests)
    pub fn mit_bausteinen(
        config: &KlientConfig,
        anmeldung: Anmeldung,
        verbinder: Arc<dyn Verbinder>,
        backend: Arc<dyn AufnahmeBackend>,
        speicher: Arc<dyn ZustandsSpeicher>,
        fabrik: Arc<dyn PeerTransportFabrik>,
        senke: Arc<dyn AudioSenke>,
    ) -> Self {
        let waechter = Arc::new(MedienWaechter::neu(
            backend,
            config.audio.aufnahme_konfig(),
        ));
        let bridge = Arc::new(StoreBridge::neu(speicher));
        let manager = VerbindungsManager::neu(
            ManagerKonfig {
                basis_url: config.verbindung.basis_url.clone(),
                token: anmeldung.token,
                lokale_id: anmeldung.teilnehmer_id,
            },
            verbinder,
            bridge,
            Arc::clone(&waechter),
            fabrik,
            senke,
        );
        tracing::info!(
            basis_url = %config.verbindung.basis_url,
            teilnehmer = %anmeldung.teilnehmer_id,
            "Palaver-Klient verdrahtet"
        );
        Self { manager, waechter }
    }

    /// Abonniert die Klient-Ereignisse (Verbindungs-Lebenszyklus)
    pub fn ereignisse(&self) -> broadcast::Receiver<KlientEreignis> {
        self.manager.ereignisse()
    }

    /// Tritt einem Text-Kanal bei; ersetzt eine bestehende Text-Verbindung
    pub async fn text_beitreten(&self, kanal: KanalId) -> Result<()> {
        self.manager.text_beitreten(kanal).await
    }

    /// Verlaesst den Text-Kanal; wirft nie
    pub async fn text_verlassen(&self) {
        self.manager.text_verlassen().await;
    }

    /// Sendet eine Chat-Nachricht in den aktiven Text-Kanal
    pub async fn nachricht_senden(&self, inhalt: impl Into<String>) -> Result<()> {
        self.manager.nachricht_senden(inhalt).await
    }

    /// Tritt einem Voice-Kanal bei (Mikrofon wird vorher erworben)
    pub async fn voice_beitreten(&self, kanal: KanalId) -> Result<()> {
        self.manager.voice_beitreten(kanal).await
    }

    /// Verlaesst den Voice-Kanal; wirft nie
    pub async fn voice_verlassen(&self) {
        self.manager.voice_verlassen().await;
    }

    /// Mutet bzw. entmutet das lokale Mikrofon
    pub fn stumm_setzen(&self, stumm: bool) {
        self.manager.stumm_setzen(stumm);
    }

    /// Gibt true zurueck wenn gerade eine Aufnahme laeuft
    pub fn mikrofon_aktiv(&self) -> bool {
        self.waechter.ist_aktiv()
    }

    /// Kanal der aktiven Text-Verbindung
    pub async fn text_kanal(&self) -> Option<KanalId> {
        self.manager.text_kanal().await
    }

    /// Kanal der aktiven Voice-Sitzung
    pub async fn voice_kanal(&self) -> Option<KanalId> {
        self.manager.voice_kanal().await
    }

    /// Verlaesst beide Kanaele (Logout, Shutdown)
    pub async fn alles_verlassen(&self) {
        self.manager.alles_verlassen().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palaver_core::error::{PalaverError, Result};
    use palaver_media::{Aufnahme, AufnahmeKonfig, LokaleMedien, MedienFehler, MedienResult};
    use palaver_mesh::{PeerTransport, TransportEreignis};
    use palaver_protocol::envelope::{ChatNachricht, FehlerMeldung, KanalEreignis, UserInfo};
    use palaver_signaling::SignalTransport;
    use tokio::sync::mpsc;

    struct NullSpeicher;
    impl ZustandsSpeicher for NullSpeicher {
        fn chat_nachricht(&self, _n: &ChatNachricht) {}
        fn teilnehmer_beigetreten(&self, _e: &KanalEreignis) {}
        fn teilnehmer_verlassen(&self, _e: &KanalEreignis) {}
        fn voice_roster_geaendert(&self, _t: &[UserInfo]) {}
        fn server_fehler(&self, _m: &FehlerMeldung) {}
    }

    struct NullVerbinder;
    #[async_trait]
    impl Verbinder for NullVerbinder {
        async fn verbinden(&self, _url: &str) -> Result<Box<dyn SignalTransport>> {
            Err(PalaverError::Transport("Kein Server im Test".into()))
        }
    }

    struct NullBackend;
    impl AufnahmeBackend for NullBackend {
        fn oeffnen(&self, _k: &AufnahmeKonfig) -> MedienResult<Aufnahme> {
            Err(MedienFehler::NichtVerfuegbar("Kein Mikrofon im Test".into()))
        }
    }

    struct NullFabrik;
    #[async_trait]
    impl PeerTransportFabrik for NullFabrik {
        async fn erstellen(
            &self,
            _teilnehmer: TeilnehmerId,
            _medien: LokaleMedien,
            _ereignisse: mpsc::Sender<TransportEreignis>,
        ) -> Result<Arc<dyn PeerTransport>> {
            Err(PalaverError::Transport("Kein Peer im Test".into()))
        }
    }

    struct NullSenke;
    impl AudioSenke for NullSenke {
        fn wiedergeben(&self, _t: TeilnehmerId, _a: palaver_media::RemoteAudio) {}
        fn stoppen(&self, _t: TeilnehmerId) {}
    }

    fn klient() -> PalaverKlient {
        PalaverKlient::mit_bausteinen(
            &KlientConfig::default(),
            Anmeldung {
                token: "tok".into(),
                teilnehmer_id: TeilnehmerId(1),
            },
            Arc::new(NullVerbinder),
            Arc::new(NullBackend),
            Arc::new(NullSpeicher),
            Arc::new(NullFabrik),
            Arc::new(NullSenke),
        )
    }

    #[tokio::test]
    async fn senden_ohne_beitritt_ist_nicht_verbunden() {
        let klient = klient();
        let fehler = klient.nachricht_senden("hi").await.unwrap_err();
        assert!(matches!(fehler, PalaverError::NichtVerbunden(_)));
    }

    #[tokio::test]
    async fn voice_beitritt_ohne_mikrofon_schlaegt_fehl() {
        let klient = klient();
        let fehler = klient.voice_beitreten(KanalId(42)).await.unwrap_err();
        assert!(matches!(fehler, PalaverError::MedienNichtVerfuegbar(_)));
        assert!(!klient.mikrofon_aktiv());
        assert_eq!(klient.voice_kanal().await, None);
    }

    #[tokio::test]
    async fn verlassen_ohne_beitritt_wirft_nie() {
        let klient = klient();
        klient.text_verlassen().await;
        klient.voice_verlassen().await;
        klient.stumm_setzen(true);
        klient.alles_verlassen().await;
    }
}
