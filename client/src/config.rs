//! Klient-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Klient ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};

use palaver_media::AufnahmeKonfig;

/// Vollstaendige Klient-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct KlientConfig {
    /// Verbindungs-Einstellungen (Directory Service)
    pub verbindung: VerbindungsEinstellungen,
    /// Audio-Einstellungen (lokale Aufnahme)
    pub audio: AudioEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// Basis-URL des Directory Service, z.B. `ws://localhost:8000`
    pub basis_url: String,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            basis_url: "ws://localhost:8000".into(),
        }
    }
}

/// Audio-Einstellungen fuer die lokale Aufnahme
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono, 2 = Stereo)
    pub kanaele: u16,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            kanaele: 1,
        }
    }
}

impl AudioEinstellungen {
    /// Uebersetzt die Einstellungen in eine Aufnahme-Konfiguration
    pub fn aufnahme_konfig(&self) -> AufnahmeKonfig {
        AufnahmeKonfig {
            sample_rate: self.sample_rate,
            kanaele: self.kanaele,
            ..AufnahmeKonfig::default()
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl KlientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(_) => Ok(Self::default()),
        }
    }
}
