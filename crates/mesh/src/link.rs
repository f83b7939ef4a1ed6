//! PeerLink – Lebenszyklus einer einzelnen Peer-Verbindung
//!
//! Zustandsmaschine: Neu -> Verhandeln -> Verbunden -> Geschlossen.
//! Uebergaenge laufen nur vorwaerts; ein geschlossener Link wird nie
//! wiederverwendet, ein erneuter Beitritt erzeugt einen frischen Link.

use palaver_core::types::TeilnehmerId;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::transport::PeerTransport;

/// Rolle des lokalen Teilnehmers auf diesem Link
///
/// Die kleinere Teilnehmer-ID initiiert (erzeugt das Offer), die
/// groessere antwortet. So entsteht nie ein Offer-Zusammenstoss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rolle {
    /// Lokale ID ist kleiner: wir erzeugen das Offer
    Initiator,
    /// Lokale ID ist groesser: wir warten auf das entfernte Offer
    Responder,
}

/// Lebenszyklus-Zustand eines PeerLinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkZustand {
    /// Link existiert, Verhandlung noch nicht gestartet
    Neu,
    /// Offer/Answer-Austausch laeuft
    Verhandeln,
    /// Medien fliessen
    Verbunden,
    /// Endzustand, Link wird entfernt
    Geschlossen,
}

impl std::fmt::Display for LinkZustand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkZustand::Neu => write!(f, "neu"),
            LinkZustand::Verhandeln => write!(f, "verhandeln"),
            LinkZustand::Verbunden => write!(f, "verbunden"),
            LinkZustand::Geschlossen => write!(f, "geschlossen"),
        }
    }
}

/// Eine Peer-Verbindung zu genau einem entfernten Teilnehmer
pub struct PeerLink {
    teilnehmer: TeilnehmerId,
    rolle: Rolle,
    zustand: LinkZustand,
    transport: Arc<dyn PeerTransport>,
}

impl PeerLink {
    /// Erstellt einen frischen Link im Zustand `Neu`
    pub fn neu(teilnehmer: TeilnehmerId, rolle: Rolle, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            teilnehmer,
            rolle,
            zustand: LinkZustand::Neu,
            transport,
        }
    }

    /// Entfernter Teilnehmer dieses Links
    pub fn teilnehmer(&self) -> TeilnehmerId {
        self.teilnehmer
    }

    /// Lokale Rolle auf diesem Link
    pub fn rolle(&self) -> Rolle {
        self.rolle
    }

    /// Aktueller Zustand
    pub fn zustand(&self) -> LinkZustand {
        self.zustand
    }

    /// Transport dieses Links
    pub fn transport(&self) -> &Arc<dyn PeerTransport> {
        &self.transport
    }

    /// Gibt true zurueck wenn der Link im Endzustand ist
    pub fn ist_geschlossen(&self) -> bool {
        self.zustand == LinkZustand::Geschlossen
    }

    /// Wechselt in einen neuen Zustand.
    ///
    /// Rueckwaerts-Uebergaenge und Uebergaenge aus `Geschlossen` werden
    /// verweigert und geloggt; der Zustand bleibt dann unveraendert.
    pub fn wechseln(&mut self, neu: LinkZustand) -> bool {
        let erlaubt = matches!(
            (self.zustand, neu),
            (LinkZustand::Neu, LinkZustand::Verhandeln)
                | (LinkZustand::Neu, LinkZustand::Geschlossen)
                | (LinkZustand::Verhandeln, LinkZustand::Verbunden)
                | (LinkZustand::Verhandeln, LinkZustand::Geschlossen)
                | (LinkZustand::Verbunden, LinkZustand::Geschlossen)
        );
        if erlaubt {
            debug!(
                teilnehmer = %self.teilnehmer,
                von = %self.zustand,
                nach = %neu,
                "Link-Zustandswechsel"
            );
            self.zustand = neu;
        } else {
            warn!(
                teilnehmer = %self.teilnehmer,
                von = %self.zustand,
                nach = %neu,
                "Unzulaessiger Link-Zustandswechsel verweigert"
            );
        }
        erlaubt
    }
}
