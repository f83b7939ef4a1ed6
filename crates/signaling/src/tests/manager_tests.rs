//! Unit-Tests fuer den Verbindungs-Manager: Beitritt/Ersetzen/Verlassen,
//! Nachrichtenversand, Voice-Sitzungs-Lebenszyklus

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use palaver_core::error::PalaverError;
use palaver_core::event::KlientEreignis;
use palaver_core::types::{KanalId, TeilnehmerId, Verbindungsart};
use palaver_media::{AufnahmeBackend, AufnahmeKonfig, MedienWaechter};
use palaver_mesh::{AudioSenke, PeerTransportFabrik};
use palaver_store::{StoreBridge, ZustandsSpeicher};

use super::fakes::{
    warte_bis, EinfacheFabrik, FakeSpeicher, FakeVerbinder, StilleSenke, TestBackend,
};
use crate::manager::{ManagerKonfig, VerbindungsManager};
use crate::transport::Verbinder;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    manager: Arc<VerbindungsManager>,
    verbinder: Arc<FakeVerbinder>,
    speicher: Arc<FakeSpeicher>,
    waechter: Arc<MedienWaechter>,
    backend: Arc<TestBackend>,
    ereignisse: broadcast::Receiver<KlientEreignis>,
}

fn harness_mit_mikrofon(lokale_id: i64, mikrofon: bool) -> Harness {
    let verbinder = Arc::new(FakeVerbinder::default());
    let speicher = Arc::new(FakeSpeicher::default());
    let bridge = Arc::new(StoreBridge::neu(
        Arc::clone(&speicher) as Arc<dyn ZustandsSpeicher>
    ));
    let backend = Arc::new(TestBackend::neu(mikrofon));
    let waechter = Arc::new(MedienWaechter::neu(
        Arc::clone(&backend) as Arc<dyn AufnahmeBackend>,
        AufnahmeKonfig::default(),
    ));
    let manager = VerbindungsManager::neu(
        ManagerKonfig {
            basis_url: "ws://test".into(),
            token: "tok".into(),
            lokale_id: TeilnehmerId(lokale_id),
        },
        Arc::clone(&verbinder) as Arc<dyn Verbinder>,
        bridge,
        Arc::clone(&waechter),
        Arc::new(EinfacheFabrik) as Arc<dyn PeerTransportFabrik>,
        Arc::new(StilleSenke) as Arc<dyn AudioSenke>,
    );
    let ereignisse = manager.ereignisse();
    Harness {
        manager,
        verbinder,
        speicher,
        waechter,
        backend,
        ereignisse,
    }
}

fn harness(lokale_id: i64) -> Harness {
    harness_mit_mikrofon(lokale_id, true)
}

impl Harness {
    /// Alle bislang versendeten Klient-Ereignisse
    fn ereignisse_abholen(&mut self) -> Vec<KlientEreignis> {
        let mut alle = Vec::new();
        while let Ok(e) = self.ereignisse.try_recv() {
            alle.push(e);
        }
        alle
    }
}

fn chat_frame(id: i64, content: &str) -> String {
    format!(
        r#"{{"type":"chat_message","data":{{"id":{},"content":"{}","user_id":3,"username":"anna","channel_id":1}}}}"#,
        id, content
    )
}

const ROSTER_FRAME: &str = r#"{"type":"voice_users_update","data":{"channel_id":42,"users":[{"id":1,"username":"ich"},{"id":2,"username":"ben"}]}}"#;

// ---------------------------------------------------------------------------
// Text-Verbindung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn text_beitritt_baut_die_richtige_url() {
    let h = harness(1);
    h.manager.text_beitreten(KanalId(7)).await.unwrap();
    assert_eq!(h.verbinder.anzahl(), 1);
    assert_eq!(h.verbinder.endpunkt(0).url, "ws://test/ws/chat/7?token=tok");
    assert_eq!(h.manager.text_kanal().await, Some(KanalId(7)));
}

#[tokio::test]
async fn erneuter_beitritt_ersetzt_die_text_verbindung() {
    let mut h = harness(1);
    h.manager.text_beitreten(KanalId(1)).await.unwrap();
    h.manager.text_beitreten(KanalId(2)).await.unwrap();

    assert_eq!(h.manager.text_kanal().await, Some(KanalId(2)));
    let alt = h.verbinder.endpunkt(0);
    assert!(
        warte_bis(|| alt.ist_geschlossen()).await,
        "Alte Verbindung muss geschlossen werden"
    );

    let ereignisse = h.ereignisse_abholen();
    assert!(matches!(
        ereignisse.as_slice(),
        [
            KlientEreignis::VerbindungOffen { kanal_id: KanalId(1), .. },
            KlientEreignis::VerbindungGetrennt { kanal_id: KanalId(1), .. },
            KlientEreignis::VerbindungOffen { kanal_id: KanalId(2), .. },
        ]
    ));
}

#[tokio::test]
async fn verbindungs_fehler_laesst_keinen_zustand_zurueck() {
    let h = harness(1);
    h.verbinder.fehlschlagen.store(true, Ordering::SeqCst);

    let fehler = h.manager.text_beitreten(KanalId(1)).await.unwrap_err();
    assert!(matches!(fehler, PalaverError::Transport(_)));
    assert!(fehler.ist_wiederholbar());
    assert_eq!(h.manager.text_kanal().await, None);
}

#[tokio::test]
async fn nachricht_senden_erfordert_text_verbindung() {
    let h = harness(1);
    let fehler = h.manager.nachricht_senden("hallo").await.unwrap_err();
    assert!(matches!(fehler, PalaverError::NichtVerbunden(_)));

    h.manager.text_beitreten(KanalId(1)).await.unwrap();
    h.manager.nachricht_senden("welt").await.unwrap();

    let endpunkt = h.verbinder.endpunkt(0);
    let mut frames = Vec::new();
    assert!(
        warte_bis(|| {
            frames.extend(endpunkt.gesendete());
            !frames.is_empty()
        })
        .await
    );
    let wert: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(
        wert,
        serde_json::json!({ "type": "chat_message", "data": { "content": "welt" } })
    );
}

#[tokio::test]
async fn chat_nachrichten_kommen_in_reihenfolge_und_dedupliziert_an() {
    let h = harness(1);
    h.manager.text_beitreten(KanalId(1)).await.unwrap();
    let endpunkt = h.verbinder.endpunkt(0);

    endpunkt.einspielen(&chat_frame(1, "erste")).await;
    endpunkt.einspielen(&chat_frame(1, "erste")).await; // Duplikat
    endpunkt.einspielen(&chat_frame(2, "zweite")).await;

    let speicher = Arc::clone(&h.speicher);
    assert!(warte_bis(|| speicher.nachrichten.lock().len() >= 2).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let nachrichten = h.speicher.nachrichten.lock();
    assert_eq!(nachrichten.len(), 2, "Duplikat darf nicht ankommen");
    assert_eq!(nachrichten[0].content, "erste");
    assert_eq!(nachrichten[1].content, "zweite");
}

#[tokio::test]
async fn unbekannter_envelope_typ_unterbricht_die_verbindung_nicht() {
    let h = harness(1);
    h.manager.text_beitreten(KanalId(1)).await.unwrap();
    let endpunkt = h.verbinder.endpunkt(0);

    endpunkt
        .einspielen(r#"{"type":"typing_indicator","data":{"user_id":3}}"#)
        .await;
    endpunkt.einspielen(&chat_frame(5, "danach")).await;

    let speicher = Arc::clone(&h.speicher);
    assert!(warte_bis(|| !speicher.nachrichten.lock().is_empty()).await);
    assert_eq!(h.speicher.nachrichten.lock()[0].content, "danach");
    assert_eq!(h.manager.text_kanal().await, Some(KanalId(1)));
    assert!(!endpunkt.ist_geschlossen());
}

#[tokio::test]
async fn server_fehler_wird_an_den_speicher_gemeldet() {
    let h = harness(1);
    h.manager.text_beitreten(KanalId(1)).await.unwrap();
    let endpunkt = h.verbinder.endpunkt(0);

    endpunkt
        .einspielen(r#"{"type":"error","data":{"message":"Invalid JSON format"}}"#)
        .await;

    let speicher = Arc::clone(&h.speicher);
    assert!(warte_bis(|| !speicher.fehler.lock().is_empty()).await);
    assert_eq!(h.speicher.fehler.lock()[0], "Invalid JSON format");
}

// ---------------------------------------------------------------------------
// Voice-Verbindung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn voice_beitritt_erwirbt_medien_und_initiiert_links() {
    let h = harness(1);
    h.manager.voice_beitreten(KanalId(42)).await.unwrap();
    assert!(h.waechter.ist_aktiv(), "Medien vor dem Verbinden erworben");
    assert_eq!(
        h.verbinder.endpunkt(0).url,
        "ws://test/ws/voice/42?token=tok"
    );

    let endpunkt = h.verbinder.endpunkt(0);
    endpunkt.einspielen(ROSTER_FRAME).await;

    // Als kleinere ID initiieren wir das Offer an Teilnehmer 2
    let mut frames = Vec::new();
    assert!(
        warte_bis(|| {
            frames.extend(endpunkt.gesendete());
            frames.iter().any(|f| f.contains("\"offer\""))
        })
        .await,
        "Offer an den entfernten Teilnehmer erwartet"
    );
    let offer: serde_json::Value = frames
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .find(|v: &serde_json::Value| v["type"] == "offer")
        .unwrap();
    assert_eq!(offer["target"], 2);

    // Der Roster erreicht auch den Speicher
    assert_eq!(h.speicher.roster_updates.lock().last().unwrap().len(), 2);
}

#[tokio::test]
async fn voice_beitritt_ohne_mikrofon_laesst_keinen_teilzustand() {
    let mut h = harness_mit_mikrofon(1, false);
    let fehler = h.manager.voice_beitreten(KanalId(42)).await.unwrap_err();

    assert!(matches!(fehler, PalaverError::MedienNichtVerfuegbar(_)));
    // Gar nicht erst verbunden
    assert_eq!(h.verbinder.versuche.load(Ordering::SeqCst), 0);
    assert_eq!(h.manager.voice_kanal().await, None);
    assert!(!h.waechter.ist_aktiv());
    assert!(h.ereignisse_abholen().is_empty());
}

#[tokio::test]
async fn voice_verlassen_raeumt_vollstaendig_auf() {
    let h = harness(1);
    h.manager.voice_beitreten(KanalId(42)).await.unwrap();
    let endpunkt = h.verbinder.endpunkt(0);
    endpunkt.einspielen(ROSTER_FRAME).await;

    let speicher = Arc::clone(&h.speicher);
    assert!(warte_bis(|| !speicher.roster_updates.lock().is_empty()).await);

    h.manager.voice_verlassen().await;

    assert_eq!(h.manager.voice_kanal().await, None);
    assert!(!h.waechter.ist_aktiv(), "Medien freigegeben");
    assert_eq!(h.backend.stopps.load(Ordering::SeqCst), 1);
    assert!(warte_bis(|| endpunkt.ist_geschlossen()).await);
    assert!(
        h.speicher.roster_updates.lock().last().unwrap().is_empty(),
        "Roster beim Verlassen geleert"
    );

    // Erneutes Verlassen ist ein No-Op und wirft nie
    h.manager.voice_verlassen().await;
    assert_eq!(h.backend.stopps.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn grosser_roster_blockiert_das_verlassen_nicht() {
    let h = harness(1);
    h.manager.voice_beitreten(KanalId(42)).await.unwrap();
    let endpunkt = h.verbinder.endpunkt(0);

    // Roster mit 80 entfernten Teilnehmern: wir initiieren jedes Offer
    let users: Vec<String> = (1..=81)
        .map(|id| format!(r#"{{"id":{},"username":"user{}"}}"#, id, id))
        .collect();
    let frame = format!(
        r#"{{"type":"voice_users_update","data":{{"channel_id":42,"users":[{}]}}}}"#,
        users.join(",")
    );
    endpunkt.einspielen(&frame).await;

    let speicher = Arc::clone(&h.speicher);
    assert!(warte_bis(|| !speicher.roster_updates.lock().is_empty()).await);

    // Verlassen muss auch mitten im Offer-Schwall durchlaufen
    tokio::time::timeout(Duration::from_secs(3), h.manager.voice_verlassen())
        .await
        .expect("Verlassen darf nicht haengen");

    assert_eq!(h.manager.voice_kanal().await, None);
    assert!(!h.waechter.ist_aktiv(), "Medien freigegeben");
    assert!(warte_bis(|| endpunkt.ist_geschlossen()).await);
}

#[tokio::test]
async fn erneuter_voice_beitritt_ersetzt_die_sitzung() {
    let h = harness(1);
    h.manager.voice_beitreten(KanalId(10)).await.unwrap();
    h.manager.voice_beitreten(KanalId(11)).await.unwrap();

    assert_eq!(h.manager.voice_kanal().await, Some(KanalId(11)));
    assert!(h.waechter.ist_aktiv());
    // Die Medien der ersten Sitzung wurden freigegeben und neu erworben
    assert_eq!(h.backend.stopps.load(Ordering::SeqCst), 1);
    let alt = h.verbinder.endpunkt(0);
    assert!(warte_bis(|| alt.ist_geschlossen()).await);
}

#[tokio::test]
async fn remote_trennung_baut_die_voice_sitzung_ab() {
    let mut h = harness(1);
    h.manager.voice_beitreten(KanalId(42)).await.unwrap();
    let _ = h.ereignisse_abholen();

    // Server trennt die Verbindung
    h.verbinder.endpunkt(0).server_schliessen();

    let waechter = Arc::clone(&h.waechter);
    assert!(
        warte_bis(|| !waechter.ist_aktiv()).await,
        "Medien nach Remote-Trennung freigegeben"
    );
    assert_eq!(h.manager.voice_kanal().await, None);

    let ereignisse = h.ereignisse_abholen();
    assert!(ereignisse.iter().any(|e| matches!(
        e,
        KlientEreignis::VerbindungGetrennt {
            art: Verbindungsart::Voice,
            ..
        }
    )));
}

#[tokio::test]
async fn text_und_voice_laufen_unabhaengig() {
    let h = harness(1);
    h.manager.text_beitreten(KanalId(1)).await.unwrap();
    h.manager.voice_beitreten(KanalId(42)).await.unwrap();

    assert_eq!(h.manager.text_kanal().await, Some(KanalId(1)));
    assert_eq!(h.manager.voice_kanal().await, Some(KanalId(42)));

    // Voice-Ende beruehrt die Text-Verbindung nicht
    h.manager.voice_verlassen().await;
    assert_eq!(h.manager.text_kanal().await, Some(KanalId(1)));
    assert!(h.manager.nachricht_senden("noch da").await.is_ok());

    h.manager.alles_verlassen().await;
    assert_eq!(h.manager.text_kanal().await, None);
}
