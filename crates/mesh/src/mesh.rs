//! Peer-Mesh – ein PeerLink pro entferntem Voice-Teilnehmer
//!
//! Das Mesh gleicht seine Link-Menge gegen den Praesenz-Roster des
//! Servers ab: neue Teilnehmer bekommen einen Link, verschwundene
//! verlieren ihren. Nach jedem Abgleich gilt: Link-Menge == Roster
//! minus lokale ID.
//!
//! ## Initiator-Regel
//! Die kleinere Teilnehmer-ID erzeugt das Offer, die groessere wartet.
//! So initiieren nie beide Seiten gleichzeitig. Trifft trotzdem ein
//! Offer auf einem Initiator-Link ein (Gegenstelle mit anderer Regel),
//! wird es geloggt und beantwortet.
//!
//! ## Fehler-Isolation
//! Jeder Verhandlungsfehler betrifft genau einen Link: der Link wird
//! geschlossen und entfernt, alle anderen laufen weiter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use palaver_core::error::{PalaverError, Result};
use palaver_core::types::TeilnehmerId;
use palaver_media::LokaleMedien;
use palaver_protocol::envelope::{SignalDaten, SignalEnvelope, UserInfo};

use crate::link::{LinkZustand, PeerLink, Rolle};
use crate::senke::{AudioSenke, PraesenzSenke};
use crate::transport::{PeerTransportFabrik, TransportEreignis};

/// Kapazitaet des Transport-Ereignis-Kanals
const EREIGNIS_KAPAZITAET: usize = 64;

/// Verwaltet alle PeerLinks einer Voice-Session
pub struct PeerMesh {
    lokal: TeilnehmerId,
    medien: LokaleMedien,
    fabrik: Arc<dyn PeerTransportFabrik>,
    senke: Arc<dyn AudioSenke>,
    praesenz: Arc<dyn PraesenzSenke>,
    /// Ausgehende Signalisierungs-Envelopes (Voice-Verbindung)
    ausgang: mpsc::UnboundedSender<SignalEnvelope>,
    /// Verhandlungs-Aufrufe awaiten waehrend der Lock gehalten wird,
    /// deshalb ein tokio-Mutex
    links: Mutex<HashMap<TeilnehmerId, PeerLink>>,
    ereignis_tx: mpsc::Sender<TransportEreignis>,
    ereignis_rx: parking_lot::Mutex<Option<mpsc::Receiver<TransportEreignis>>>,
}

impl PeerMesh {
    /// Erstellt ein leeres Mesh fuer die laufende Voice-Session
    pub fn neu(
        lokal: TeilnehmerId,
        medien: LokaleMedien,
        fabrik: Arc<dyn PeerTransportFabrik>,
        senke: Arc<dyn AudioSenke>,
        praesenz: Arc<dyn PraesenzSenke>,
        ausgang: mpsc::UnboundedSender<SignalEnvelope>,
    ) -> Self {
        let (ereignis_tx, ereignis_rx) = mpsc::channel(EREIGNIS_KAPAZITAET);
        Self {
            lokal,
            medien,
            fabrik,
            senke,
            praesenz,
            ausgang,
            links: Mutex::new(HashMap::new()),
            ereignis_tx,
            ereignis_rx: parking_lot::Mutex::new(Some(ereignis_rx)),
        }
    }

    /// Lokale Teilnehmer-ID
    pub fn lokale_id(&self) -> TeilnehmerId {
        self.lokal
    }

    /// Startet die Ereignis-Pumpe: verarbeitet Transport-Ereignisse bis
    /// das Mesh gedroppt wird. Darf nur einmal aufgerufen werden.
    pub fn ereignis_pumpe_starten(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let rx = self.ereignis_rx.lock().take();
        let schwach = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(mut rx) = rx else {
                warn!("Ereignis-Pumpe bereits gestartet");
                return;
            };
            while let Some(ereignis) = rx.recv().await {
                let Some(mesh) = schwach.upgrade() else { break };
                mesh.transport_ereignis(ereignis).await;
            }
            debug!("Ereignis-Pumpe beendet");
        })
    }

    // -----------------------------------------------------------------------
    // Praesenz-Abgleich
    // -----------------------------------------------------------------------

    /// Gleicht die Link-Menge gegen den vollstaendigen Praesenz-Roster ab.
    ///
    /// Idempotent: derselbe Roster zweimal hintereinander aendert nichts.
    /// Fehler beim Erstellen oder Verhandeln eines einzelnen Links werden
    /// geloggt und uebersprungen, der Abgleich laeuft weiter.
    pub async fn praesenz_abgleichen(&self, roster: &[UserInfo]) {
        let ziel: HashSet<TeilnehmerId> = roster
            .iter()
            .map(|u| u.id)
            .filter(|id| *id != self.lokal)
            .collect();

        let mut links = self.links.lock().await;
        let mut offers: Vec<SignalEnvelope> = Vec::new();

        // Verschwundene Teilnehmer: Link schliessen und entfernen
        let weg: Vec<TeilnehmerId> = links
            .keys()
            .filter(|id| !ziel.contains(id))
            .copied()
            .collect();
        for id in weg {
            if let Some(mut link) = links.remove(&id) {
                link.wechseln(LinkZustand::Geschlossen);
                link.transport().schliessen().await;
                self.senke.stoppen(id);
                info!(teilnehmer = %id, "PeerLink entfernt (Teilnehmer gegangen)");
            }
        }

        // Neue Teilnehmer: Link erstellen, Initiator verhandelt sofort
        for id in ziel {
            if links.contains_key(&id) {
                continue;
            }

            let transport = match self
                .fabrik
                .erstellen(id, self.medien.clone(), self.ereignis_tx.clone())
                .await
            {
                Ok(t) => t,
                Err(e) => {
                    warn!(teilnehmer = %id, fehler = %e, "PeerTransport nicht erstellbar");
                    continue;
                }
            };

            let rolle = if self.lokal < id {
                Rolle::Initiator
            } else {
                Rolle::Responder
            };
            let mut link = PeerLink::neu(id, rolle, transport);

            if rolle == Rolle::Initiator {
                match link.transport().offer_erzeugen().await {
                    Ok(signal) => {
                        link.wechseln(LinkZustand::Verhandeln);
                        offers.push(SignalEnvelope::offer(id, signal));
                    }
                    Err(e) => {
                        warn!(teilnehmer = %id, fehler = %e, "Offer-Erzeugung fehlgeschlagen");
                        link.transport().schliessen().await;
                        continue;
                    }
                }
            }

            info!(teilnehmer = %id, rolle = ?rolle, "PeerLink erstellt");
            links.insert(id, link);
        }

        // Erst nach Freigabe des Link-Locks in die Sende-Queue einreihen
        drop(links);
        for envelope in offers {
            self.senden(envelope);
        }
    }

    // -----------------------------------------------------------------------
    // Eingehende Signalisierung
    // -----------------------------------------------------------------------

    /// Entferntes Offer: Answer erzeugen und zurueckschicken.
    ///
    /// Kommt das Offer vor dem Praesenz-Update an, wird der Link auf
    /// Verdacht erstellt (der Roster bestaetigt ihn spaeter).
    pub async fn offer_empfangen(&self, von: TeilnehmerId, signal: SignalDaten) -> Result<()> {
        let mut links = self.links.lock().await;

        if !links.contains_key(&von) {
            debug!(teilnehmer = %von, "Offer vor Praesenz-Update, Link wird erstellt");
            let transport = self
                .fabrik
                .erstellen(von, self.medien.clone(), self.ereignis_tx.clone())
                .await?;
            links.insert(von, PeerLink::neu(von, Rolle::Responder, transport));
        }

        let Some(link) = links.get_mut(&von) else {
            return Ok(());
        };
        if link.ist_geschlossen() {
            debug!(teilnehmer = %von, "Offer auf geschlossenem Link ignoriert");
            return Ok(());
        }
        if link.rolle() == Rolle::Initiator {
            // Gegenstelle haelt sich nicht an die Initiator-Regel;
            // beantworten ist das robustere Verhalten
            warn!(teilnehmer = %von, "Unerwartetes Offer auf Initiator-Link");
        }

        if link.zustand() == LinkZustand::Neu {
            link.wechseln(LinkZustand::Verhandeln);
        }

        match link.transport().offer_anwenden(signal).await {
            Ok(antwort) => {
                drop(links);
                self.senden(SignalEnvelope::answer(von, antwort));
                Ok(())
            }
            Err(e) => {
                self.link_entfernen(&mut links, von).await;
                Err(PalaverError::Verhandlung {
                    teilnehmer: von.to_string(),
                    grund: e.to_string(),
                })
            }
        }
    }

    /// Entfernte Answer auf unser Offer
    pub async fn answer_empfangen(&self, von: TeilnehmerId, signal: SignalDaten) -> Result<()> {
        let mut links = self.links.lock().await;
        let Some(link) = links.get_mut(&von) else {
            debug!(teilnehmer = %von, "Answer ohne Link ignoriert");
            return Ok(());
        };
        if link.zustand() != LinkZustand::Verhandeln {
            debug!(
                teilnehmer = %von,
                zustand = %link.zustand(),
                "Answer ausserhalb der Verhandlung ignoriert"
            );
            return Ok(());
        }

        match link.transport().answer_anwenden(signal).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.link_entfernen(&mut links, von).await;
                Err(PalaverError::Verhandlung {
                    teilnehmer: von.to_string(),
                    grund: e.to_string(),
                })
            }
        }
    }

    /// Entfernter ICE-Kandidat; ohne passenden Link ein No-Op
    pub async fn kandidat_empfangen(&self, von: TeilnehmerId, signal: SignalDaten) {
        let links = self.links.lock().await;
        let Some(link) = links.get(&von) else {
            debug!(teilnehmer = %von, "ICE-Kandidat ohne Link verworfen");
            return;
        };
        if link.ist_geschlossen() {
            return;
        }
        if let Err(e) = link.transport().kandidat_hinzufuegen(signal).await {
            debug!(teilnehmer = %von, fehler = %e, "ICE-Kandidat abgelehnt");
        }
    }

    // -----------------------------------------------------------------------
    // Transport-Ereignisse
    // -----------------------------------------------------------------------

    /// Verarbeitet ein asynchrones Transport-Ereignis
    pub async fn transport_ereignis(&self, ereignis: TransportEreignis) {
        match ereignis {
            TransportEreignis::Verbunden { teilnehmer, audio } => {
                let mut links = self.links.lock().await;
                if let Some(link) = links.get_mut(&teilnehmer) {
                    if link.wechseln(LinkZustand::Verbunden) {
                        info!(teilnehmer = %teilnehmer, "PeerLink verbunden");
                        self.senke.wiedergeben(teilnehmer, audio);
                    }
                } else {
                    debug!(teilnehmer = %teilnehmer, "Verbunden-Ereignis ohne Link");
                }
            }
            TransportEreignis::Geschlossen { teilnehmer } => {
                let mut links = self.links.lock().await;
                if self.link_entfernen(&mut links, teilnehmer).await {
                    info!(teilnehmer = %teilnehmer, "PeerLink von Gegenstelle geschlossen");
                    self.praesenz.teilnehmer_weggefallen(teilnehmer);
                }
            }
            TransportEreignis::Fehler { teilnehmer, grund } => {
                let mut links = self.links.lock().await;
                if self.link_entfernen(&mut links, teilnehmer).await {
                    warn!(teilnehmer = %teilnehmer, grund = %grund, "PeerLink fehlgeschlagen");
                    self.praesenz.teilnehmer_weggefallen(teilnehmer);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Abbau
    // -----------------------------------------------------------------------

    /// Schliesst einen einzelnen Link; No-Op wenn er nicht existiert
    pub async fn link_schliessen(&self, teilnehmer: TeilnehmerId) {
        let mut links = self.links.lock().await;
        self.link_entfernen(&mut links, teilnehmer).await;
    }

    /// Schliesst alle Links (Session-Ende)
    pub async fn alle_schliessen(&self) {
        let mut links = self.links.lock().await;
        let alle: Vec<TeilnehmerId> = links.keys().copied().collect();
        for id in alle {
            self.link_entfernen(&mut links, id).await;
        }
        info!("Alle PeerLinks geschlossen");
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Zustand des Links zum gegebenen Teilnehmer
    pub async fn zustand_von(&self, teilnehmer: TeilnehmerId) -> Option<LinkZustand> {
        self.links.lock().await.get(&teilnehmer).map(|l| l.zustand())
    }

    /// Alle Teilnehmer mit verbundenem Link
    pub async fn verbundene(&self) -> Vec<TeilnehmerId> {
        let links = self.links.lock().await;
        let mut ids: Vec<TeilnehmerId> = links
            .values()
            .filter(|l| l.zustand() == LinkZustand::Verbunden)
            .map(|l| l.teilnehmer())
            .collect();
        ids.sort();
        ids
    }

    /// Anzahl aller Links (unabhaengig vom Zustand)
    pub async fn anzahl_links(&self) -> usize {
        self.links.lock().await.len()
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn senden(&self, envelope: SignalEnvelope) {
        if self.ausgang.send(envelope).is_err() {
            warn!("Signal-Ausgang geschlossen, Envelope verworfen");
        }
    }

    async fn link_entfernen(
        &self,
        links: &mut HashMap<TeilnehmerId, PeerLink>,
        teilnehmer: TeilnehmerId,
    ) -> bool {
        let Some(mut link) = links.remove(&teilnehmer) else {
            return false;
        };
        link.wechseln(LinkZustand::Geschlossen);
        link.transport().schliessen().await;
        self.senke.stoppen(teilnehmer);
        true
    }
}
