//! Kanal-Verbindung – ein Task pro offener Signal-Verbindung
//!
//! Jede Verbindung (Text oder Voice) bekommt einen eigenen tokio-Task
//! mit einer select!-Schleife: eingehende Frames werden dekodiert und an
//! den Router verteilt, ausgehende Envelopes aus der Sende-Queue kodiert
//! und verschickt.
//!
//! Die Verteilung ist strikt sequenziell: der naechste Frame wird erst
//! gelesen wenn der Router den vorigen verarbeitet hat. So bleibt die
//! Empfangs-Reihenfolge pro Verbindung erhalten.
//!
//! Die Sende-Queue ist unbegrenzt: die Verteilung laeuft in derselben
//! Schleife die die Queue leert und darf deshalb nie auf dem eigenen
//! Ausgang blockieren.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use palaver_core::error::{PalaverError, Result};
use palaver_core::types::{KanalId, Verbindungsart};
use palaver_protocol::codec;
use palaver_protocol::envelope::SignalEnvelope;

use crate::router::EnvelopeRouter;
use crate::transport::SignalTransport;

/// Handle auf eine laufende Signal-Verbindung
pub struct KanalVerbindung {
    art: Verbindungsart,
    kanal: KanalId,
    sende_tx: mpsc::UnboundedSender<SignalEnvelope>,
    stopp_tx: watch::Sender<bool>,
}

impl KanalVerbindung {
    /// Startet den Verbindungs-Task ueber dem offenen Transport.
    ///
    /// Der zurueckgegebene Receiver liefert genau einmal den Trenn-Grund
    /// sobald der Task endet (egal ob lokal oder von der Gegenstelle).
    pub fn starten(
        transport: Box<dyn SignalTransport>,
        router: Arc<dyn EnvelopeRouter>,
        art: Verbindungsart,
        kanal: KanalId,
    ) -> (Self, mpsc::Receiver<String>) {
        let (sende_tx, sende_rx) = mpsc::unbounded_channel();
        let (stopp_tx, stopp_rx) = watch::channel(false);
        let (beendet_tx, beendet_rx) = mpsc::channel(1);

        tokio::spawn(verbindungs_schleife(
            transport, router, art, kanal, sende_rx, stopp_rx, beendet_tx,
        ));

        (
            Self {
                art,
                kanal,
                sende_tx,
                stopp_tx,
            },
            beendet_rx,
        )
    }

    /// Verbindungsart dieser Verbindung
    pub fn art(&self) -> Verbindungsart {
        self.art
    }

    /// Kanal dieser Verbindung
    pub fn kanal(&self) -> KanalId {
        self.kanal
    }

    /// Reiht ein Envelope in die Sende-Queue ein; blockiert nie
    pub fn senden(&self, envelope: SignalEnvelope) -> Result<()> {
        self.sende_tx
            .send(envelope)
            .map_err(|_| PalaverError::NichtVerbunden("Sende-Queue geschlossen".into()))
    }

    /// Klon der Sende-Queue (z.B. fuer das Peer-Mesh)
    pub fn ausgang(&self) -> mpsc::UnboundedSender<SignalEnvelope> {
        self.sende_tx.clone()
    }

    /// Stoesst das lokale Schliessen an; der Task beendet sich danach
    pub fn stoppen(&self) {
        let _ = self.stopp_tx.send(true);
    }
}

async fn verbindungs_schleife(
    mut transport: Box<dyn SignalTransport>,
    router: Arc<dyn EnvelopeRouter>,
    art: Verbindungsart,
    kanal: KanalId,
    mut sende_rx: mpsc::UnboundedReceiver<SignalEnvelope>,
    mut stopp_rx: watch::Receiver<bool>,
    beendet_tx: mpsc::Sender<String>,
) {
    info!(art = %art, kanal = %kanal, "Verbindungs-Task gestartet");

    let grund: String = loop {
        tokio::select! {
            // Eingehender Frame vom Server
            eingehend = transport.empfangen() => {
                match eingehend {
                    Some(Ok(text)) => {
                        match codec::dekodieren(&text) {
                            Ok(envelope) => {
                                trace!(art = %art, typ = envelope.typ_name(), "Envelope empfangen");
                                router.verteilen(envelope).await;
                            }
                            Err(e) if e.ist_unbekannter_typ() => {
                                // Vorwaertskompatibilitaet: unbekannte Typen sind ein No-Op
                                debug!(art = %art, fehler = %e, "Unbekannter Envelope-Typ ignoriert");
                            }
                            Err(e) => {
                                warn!(art = %art, fehler = %e, "Envelope nicht dekodierbar, ignoriert");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(art = %art, kanal = %kanal, fehler = %e, "Transportfehler");
                        break format!("Transportfehler: {}", e);
                    }
                    None => {
                        info!(art = %art, kanal = %kanal, "Vom Server getrennt");
                        break "Vom Server getrennt".to_string();
                    }
                }
            }

            // Ausgehendes Envelope aus der Sende-Queue
            ausgehend = sende_rx.recv() => {
                match ausgehend {
                    Some(envelope) => {
                        match codec::kodieren(&envelope) {
                            Ok(text) => {
                                if let Err(e) = transport.senden(text).await {
                                    warn!(art = %art, fehler = %e, "Senden fehlgeschlagen");
                                    break format!("Sendefehler: {}", e);
                                }
                            }
                            Err(e) => {
                                warn!(art = %art, fehler = %e, "Envelope nicht kodierbar, verworfen");
                            }
                        }
                    }
                    None => {
                        transport.schliessen().await;
                        break "Lokal geschlossen".to_string();
                    }
                }
            }

            // Lokales Schliessen
            _ = stopp_rx.changed() => {
                transport.schliessen().await;
                break "Lokal geschlossen".to_string();
            }
        }
    };

    info!(art = %art, kanal = %kanal, grund = %grund, "Verbindungs-Task beendet");
    let _ = beendet_tx.send(grund).await;
}
