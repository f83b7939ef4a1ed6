//! Store-Bruecke – uebersetzt Signal-Ereignisse in Zustands-Updates
//!
//! Die UI haelt ihren eigenen Zustandsspeicher; dieser Modul ist die
//! einzige Stelle die hineinschreibt. Chat-Nachrichten werden ueber ein
//! begrenztes Fenster dedupliziert, damit jede Nachrichten-ID hoechstens
//! einmal im Speicher landet (Reconnects koennen Nachrichten doppelt
//! liefern).

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use palaver_core::types::{NachrichtenId, TeilnehmerId};
use palaver_protocol::envelope::{ChatNachricht, FehlerMeldung, KanalEreignis, UserInfo, VoiceRoster};

/// Maximale Anzahl gemerkter Nachrichten-IDs im Dedup-Fenster
const DEDUP_FENSTER: usize = 1024;

// ---------------------------------------------------------------------------
// ZustandsSpeicher
// ---------------------------------------------------------------------------

/// Senke fuer Zustands-Updates (implementiert von der UI-Schicht)
///
/// Alle Methoden muessen schnell und fehlerfrei sein; die Bruecke ruft
/// sie synchron aus dem Dispatch-Pfad auf.
pub trait ZustandsSpeicher: Send + Sync {
    /// Neue Chat-Nachricht (bereits dedupliziert)
    fn chat_nachricht(&self, nachricht: &ChatNachricht);
    /// Teilnehmer ist einem Text-Kanal beigetreten
    fn teilnehmer_beigetreten(&self, ereignis: &KanalEreignis);
    /// Teilnehmer hat einen Text-Kanal verlassen
    fn teilnehmer_verlassen(&self, ereignis: &KanalEreignis);
    /// Voice-Roster des Kanals hat sich geaendert (vollstaendige Liste)
    fn voice_roster_geaendert(&self, teilnehmer: &[UserInfo]);
    /// Server hat einen Fehler gemeldet
    fn server_fehler(&self, meldung: &FehlerMeldung);
}

// ---------------------------------------------------------------------------
// StoreBridge
// ---------------------------------------------------------------------------

/// Dedup-Fenster: Set fuer O(1)-Lookup, Queue fuer FIFO-Verdraengung
struct DedupFenster {
    gesehen: HashSet<NachrichtenId>,
    reihenfolge: VecDeque<NachrichtenId>,
}

impl DedupFenster {
    fn neu() -> Self {
        Self {
            gesehen: HashSet::with_capacity(DEDUP_FENSTER),
            reihenfolge: VecDeque::with_capacity(DEDUP_FENSTER),
        }
    }

    /// Merkt sich die ID; gibt false zurueck wenn sie schon bekannt war
    fn merken(&mut self, id: NachrichtenId) -> bool {
        if !self.gesehen.insert(id) {
            return false;
        }
        self.reihenfolge.push_back(id);
        if self.reihenfolge.len() > DEDUP_FENSTER {
            if let Some(alt) = self.reihenfolge.pop_front() {
                self.gesehen.remove(&alt);
            }
        }
        true
    }
}

/// Bruecke zwischen den Signal-Verbindungen und dem UI-Zustandsspeicher
pub struct StoreBridge {
    speicher: Arc<dyn ZustandsSpeicher>,
    fenster: Mutex<DedupFenster>,
    voice_roster: Mutex<Vec<UserInfo>>,
}

impl StoreBridge {
    /// Erstellt die Bruecke ueber dem gegebenen Speicher
    pub fn neu(speicher: Arc<dyn ZustandsSpeicher>) -> Self {
        Self {
            speicher,
            fenster: Mutex::new(DedupFenster::neu()),
            voice_roster: Mutex::new(Vec::new()),
        }
    }

    /// Eingehende Chat-Nachricht.
    ///
    /// Nachrichten mit bekannter ID werden verworfen; Nachrichten ohne ID
    /// (der Server vergibt immer eine, aber das Format laesst sie offen)
    /// werden ungeprueft weitergereicht.
    pub fn chat_empfangen(&self, nachricht: &ChatNachricht) {
        if let Some(id) = nachricht.id {
            if !self.fenster.lock().merken(id) {
                debug!(id = %id, "Doppelte Chat-Nachricht verworfen");
                return;
            }
        }
        self.speicher.chat_nachricht(nachricht);
    }

    /// Beitritts-Ereignis auf der Text-Verbindung
    pub fn beitritt_empfangen(&self, ereignis: &KanalEreignis) {
        self.speicher.teilnehmer_beigetreten(ereignis);
    }

    /// Austritts-Ereignis auf der Text-Verbindung
    pub fn austritt_empfangen(&self, ereignis: &KanalEreignis) {
        self.speicher.teilnehmer_verlassen(ereignis);
    }

    /// Neuer Voice-Roster; ersetzt den gemerkten Stand vollstaendig
    pub fn roster_empfangen(&self, roster: &VoiceRoster) {
        *self.voice_roster.lock() = roster.users.clone();
        self.speicher.voice_roster_geaendert(&roster.users);
    }

    /// Entfernt einen einzelnen Teilnehmer aus dem Voice-Roster.
    ///
    /// Wird gerufen wenn ein Link ausserhalb eines Praesenz-Updates
    /// stirbt; der naechste Server-Roster bestaetigt die Entfernung.
    /// No-Op wenn der Teilnehmer nicht im Roster steht.
    pub fn teilnehmer_weggefallen(&self, teilnehmer: TeilnehmerId) {
        let mut aktuell = self.voice_roster.lock();
        let vorher = aktuell.len();
        aktuell.retain(|u| u.id != teilnehmer);
        if aktuell.len() != vorher {
            debug!(teilnehmer = %teilnehmer, "Teilnehmer aus Voice-Roster entfernt");
            self.speicher.voice_roster_geaendert(&aktuell);
        }
    }

    /// Leert den Voice-Roster (beim Verlassen des Voice-Kanals)
    pub fn roster_leeren(&self) {
        let mut aktuell = self.voice_roster.lock();
        if !aktuell.is_empty() {
            aktuell.clear();
            self.speicher.voice_roster_geaendert(&[]);
        }
    }

    /// Server-Fehlermeldung
    pub fn fehler_empfangen(&self, meldung: &FehlerMeldung) {
        warn!(nachricht = %meldung.message, "Server meldet Fehler");
        self.speicher.server_fehler(meldung);
    }

    /// Aktueller Voice-Roster (Kopie)
    pub fn voice_roster(&self) -> Vec<UserInfo> {
        self.voice_roster.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::types::{KanalId, TeilnehmerId};
    use std::sync::Arc;

    /// Speicher der alle Aufrufe protokolliert
    #[derive(Default)]
    struct TestSpeicher {
        nachrichten: Mutex<Vec<ChatNachricht>>,
        beitritte: Mutex<Vec<KanalEreignis>>,
        austritte: Mutex<Vec<KanalEreignis>>,
        roster_updates: Mutex<Vec<Vec<UserInfo>>>,
        fehler: Mutex<Vec<String>>,
    }

    impl ZustandsSpeicher for TestSpeicher {
        fn chat_nachricht(&self, nachricht: &ChatNachricht) {
            self.nachrichten.lock().push(nachricht.clone());
        }
        fn teilnehmer_beigetreten(&self, ereignis: &KanalEreignis) {
            self.beitritte.lock().push(ereignis.clone());
        }
        fn teilnehmer_verlassen(&self, ereignis: &KanalEreignis) {
            self.austritte.lock().push(ereignis.clone());
        }
        fn voice_roster_geaendert(&self, teilnehmer: &[UserInfo]) {
            self.roster_updates.lock().push(teilnehmer.to_vec());
        }
        fn server_fehler(&self, meldung: &FehlerMeldung) {
            self.fehler.lock().push(meldung.message.clone());
        }
    }

    fn nachricht(id: i64, content: &str) -> ChatNachricht {
        ChatNachricht {
            id: Some(NachrichtenId(id)),
            content: content.into(),
            user_id: Some(TeilnehmerId(1)),
            username: Some("anna".into()),
            channel_id: Some(KanalId(42)),
            created_at: None,
        }
    }

    fn bruecke() -> (StoreBridge, Arc<TestSpeicher>) {
        let speicher = Arc::new(TestSpeicher::default());
        (
            StoreBridge::neu(Arc::clone(&speicher) as Arc<dyn ZustandsSpeicher>),
            speicher,
        )
    }

    #[test]
    fn chat_nachricht_hoechstens_einmal() {
        let (bruecke, speicher) = bruecke();
        bruecke.chat_empfangen(&nachricht(1, "hallo"));
        bruecke.chat_empfangen(&nachricht(1, "hallo"));
        bruecke.chat_empfangen(&nachricht(2, "welt"));

        let gesehen = speicher.nachrichten.lock();
        assert_eq!(gesehen.len(), 2, "Duplikat muss verworfen werden");
        assert_eq!(gesehen[0].content, "hallo");
        assert_eq!(gesehen[1].content, "welt");
    }

    #[test]
    fn nachricht_ohne_id_wird_immer_weitergereicht() {
        let (bruecke, speicher) = bruecke();
        let ohne_id = ChatNachricht {
            id: None,
            content: "x".into(),
            user_id: None,
            username: None,
            channel_id: None,
            created_at: None,
        };
        bruecke.chat_empfangen(&ohne_id);
        bruecke.chat_empfangen(&ohne_id);
        assert_eq!(speicher.nachrichten.lock().len(), 2);
    }

    #[test]
    fn dedup_fenster_ist_begrenzt() {
        let (bruecke, speicher) = bruecke();
        // Fenster fuellen und die aelteste ID verdraengen
        for i in 0..(DEDUP_FENSTER as i64 + 1) {
            bruecke.chat_empfangen(&nachricht(i, "n"));
        }
        // ID 0 ist verdraengt und wird erneut akzeptiert
        bruecke.chat_empfangen(&nachricht(0, "wieder"));
        assert_eq!(
            speicher.nachrichten.lock().len(),
            DEDUP_FENSTER + 2,
            "Verdraengte ID darf erneut durchgehen"
        );
    }

    #[test]
    fn beitritt_und_austritt_werden_durchgereicht() {
        let (bruecke, speicher) = bruecke();
        let ereignis = KanalEreignis {
            channel_id: KanalId(42),
            user: UserInfo {
                id: TeilnehmerId(9),
                username: "ben".into(),
            },
            timestamp: None,
        };
        bruecke.beitritt_empfangen(&ereignis);
        bruecke.austritt_empfangen(&ereignis);
        assert_eq!(speicher.beitritte.lock().len(), 1);
        assert_eq!(speicher.austritte.lock().len(), 1);
    }

    #[test]
    fn roster_ersetzt_vollstaendig_und_laesst_sich_leeren() {
        let (bruecke, speicher) = bruecke();
        let roster = VoiceRoster {
            channel_id: Some(KanalId(42)),
            users: vec![
                UserInfo {
                    id: TeilnehmerId(1),
                    username: "a".into(),
                },
                UserInfo {
                    id: TeilnehmerId(2),
                    username: "b".into(),
                },
            ],
            timestamp: None,
        };
        bruecke.roster_empfangen(&roster);
        assert_eq!(bruecke.voice_roster().len(), 2);

        bruecke.roster_leeren();
        assert!(bruecke.voice_roster().is_empty());

        // Leeren ohne Inhalt ist ein No-Op (kein zweites Update)
        bruecke.roster_leeren();
        assert_eq!(speicher.roster_updates.lock().len(), 2);
    }

    #[test]
    fn einzelner_teilnehmer_faellt_aus_dem_roster() {
        let (bruecke, speicher) = bruecke();
        bruecke.roster_empfangen(&VoiceRoster {
            channel_id: None,
            users: vec![
                UserInfo {
                    id: TeilnehmerId(1),
                    username: "a".into(),
                },
                UserInfo {
                    id: TeilnehmerId(2),
                    username: "b".into(),
                },
            ],
            timestamp: None,
        });

        bruecke.teilnehmer_weggefallen(TeilnehmerId(2));
        assert_eq!(bruecke.voice_roster().len(), 1);
        assert_eq!(bruecke.voice_roster()[0].id, TeilnehmerId(1));

        // Unbekannter Teilnehmer loest kein Update aus
        bruecke.teilnehmer_weggefallen(TeilnehmerId(99));
        assert_eq!(speicher.roster_updates.lock().len(), 2);
    }

    #[test]
    fn server_fehler_wird_gemeldet() {
        let (bruecke, speicher) = bruecke();
        bruecke.fehler_empfangen(&FehlerMeldung {
            message: "Invalid JSON format".into(),
        });
        assert_eq!(speicher.fehler.lock().as_slice(), ["Invalid JSON format"]);
    }
}
