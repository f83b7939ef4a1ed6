//! Klient-Ereignisse fuer die UI-Schicht
//!
//! Der Verbindungs-Manager versendet diese Ereignisse ueber einen
//! tokio broadcast-Kanal. Die UI-Schicht abonniert sie um den
//! Verbindungszustand anzuzeigen – Chat- und Praesenz-Daten fliessen
//! separat ueber die Store-Bruecke.

use crate::types::{KanalId, Verbindungsart};
use serde::{Deserialize, Serialize};

/// Ereignisse die der Verbindungs-Manager an Abonnenten versendet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KlientEreignis {
    /// Eine Signal-Verbindung wurde geoeffnet (Handshake abgeschlossen)
    VerbindungOffen {
        art: Verbindungsart,
        kanal_id: KanalId,
    },
    /// Eine Signal-Verbindung wurde getrennt (Leave, Remote-Close oder Fehler)
    VerbindungGetrennt {
        art: Verbindungsart,
        kanal_id: KanalId,
        grund: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ereignis_ist_serde_kompatibel() {
        let ereignis = KlientEreignis::VerbindungOffen {
            art: Verbindungsart::Voice,
            kanal_id: KanalId(42),
        };
        let json = serde_json::to_string(&ereignis).unwrap();
        let _: KlientEreignis = serde_json::from_str(&json).unwrap();
    }
}
