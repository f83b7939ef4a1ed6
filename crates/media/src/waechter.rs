//! Medien-Waechter – exklusiver Besitz der lokalen Audio-Aufnahme
//!
//! Der Waechter erwirbt die Aufnahme ueber ein `AufnahmeBackend` und gibt
//! sie genau einmal wieder frei. Mute schaltet die ausgehenden Samples auf
//! Stille ohne den Aufnahme-Takt zu unterbrechen – so muss kein PeerLink
//! neu verhandeln.
//!
//! ## Invarianten
//! - Schlaegt der Erwerb fehl, bleibt kein halb-initialisierter Zustand zurueck
//! - `freigeben()` ist idempotent; die Aufnahme stoppt genau einmal
//! - Nach der Freigabe liefert jede `LokaleMedien`-Kopie 0 Samples

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::MedienResult;
use crate::quelle::AudioQuelle;

// ---------------------------------------------------------------------------
// Konfiguration & Backend
// ---------------------------------------------------------------------------

/// Konfiguration fuer die Audio-Aufnahme
#[derive(Debug, Clone)]
pub struct AufnahmeKonfig {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono, 2 = Stereo)
    pub kanaele: u16,
    /// Ring-Buffer-Kapazitaet in Samples
    pub puffer_groesse: usize,
}

impl Default for AufnahmeKonfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            kanaele: 1,
            puffer_groesse: 48000 * 2, // 2 Sekunden Puffer
        }
    }
}

/// Laufende Aufnahme wie sie ein Backend liefert
///
/// `stopper` wird beim Freigeben genau einmal aufgerufen und beendet die
/// Erfassung (z.B. Stoppen des cpal-Streams im Halter-Thread).
pub struct Aufnahme {
    /// Sample-Quelle der laufenden Erfassung
    pub quelle: Box<dyn AudioQuelle>,
    /// Stoppt die Erfassung; genau einmal aufgerufen
    pub stopper: Box<dyn FnOnce() + Send>,
}

/// Capability-Trait fuer die Aufnahme-Hardware
///
/// Die echte Implementierung (`CpalBackend`) oeffnet ein cpal-Geraet;
/// Tests injizieren ein Backend ohne Hardware.
pub trait AufnahmeBackend: Send + Sync {
    /// Oeffnet eine Aufnahme oder schlaegt mit `NichtVerfuegbar` fehl
    fn oeffnen(&self, konfig: &AufnahmeKonfig) -> MedienResult<Aufnahme>;
}

// ---------------------------------------------------------------------------
// LokaleMedien
// ---------------------------------------------------------------------------

struct LokaleMedienInner {
    stumm: AtomicBool,
    freigegeben: AtomicBool,
    quelle: Mutex<Box<dyn AudioQuelle>>,
    stopper: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    konfig: AufnahmeKonfig,
}

/// Handle auf die laufende lokale Aufnahme
///
/// Clone teilt den inneren Zustand: alle PeerLinks lesen (nur lesend)
/// aus derselben Aufnahme. Der exklusive Besitz bleibt beim Waechter.
#[derive(Clone)]
pub struct LokaleMedien {
    inner: Arc<LokaleMedienInner>,
}

impl LokaleMedien {
    fn neu(aufnahme: Aufnahme, konfig: AufnahmeKonfig) -> Self {
        Self {
            inner: Arc::new(LokaleMedienInner {
                stumm: AtomicBool::new(false),
                freigegeben: AtomicBool::new(false),
                quelle: Mutex::new(aufnahme.quelle),
                stopper: Mutex::new(Some(aufnahme.stopper)),
                konfig,
            }),
        }
    }

    /// Liest Samples fuer den ausgehenden Medien-Pfad.
    ///
    /// Bei Mute bleibt der Takt erhalten, der Inhalt wird durch Stille
    /// ersetzt. Nach der Freigabe kommt 0 zurueck.
    pub fn lesen(&self, ziel: &mut [f32]) -> usize {
        if self.inner.freigegeben.load(Ordering::Relaxed) {
            return 0;
        }
        let n = self.inner.quelle.lock().lesen(ziel);
        if self.inner.stumm.load(Ordering::Relaxed) {
            ziel[..n].fill(0.0);
        }
        n
    }

    /// Gibt true zurueck wenn das Mikrofon gemutet ist
    pub fn ist_stumm(&self) -> bool {
        self.inner.stumm.load(Ordering::Relaxed)
    }

    /// Gibt true zurueck wenn die Aufnahme bereits freigegeben wurde
    pub fn ist_freigegeben(&self) -> bool {
        self.inner.freigegeben.load(Ordering::Relaxed)
    }

    /// Gibt die Aufnahme-Konfiguration zurueck
    pub fn konfig(&self) -> &AufnahmeKonfig {
        &self.inner.konfig
    }

    fn stumm_setzen(&self, stumm: bool) {
        self.inner.stumm.store(stumm, Ordering::Relaxed);
    }

    fn freigeben(&self) {
        // Option::take garantiert genau-einmal-Stopp
        let stopper = self.inner.stopper.lock().take();
        if let Some(stopper) = stopper {
            self.inner.freigegeben.store(true, Ordering::Relaxed);
            stopper();
            debug!("Lokale Aufnahme gestoppt");
        }
    }
}

// Quelle und Stopper sind Trait-Objekte, deshalb von Hand
impl std::fmt::Debug for LokaleMedien {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LokaleMedien")
            .field("stumm", &self.ist_stumm())
            .field("freigegeben", &self.ist_freigegeben())
            .field("konfig", &self.inner.konfig)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MedienWaechter
// ---------------------------------------------------------------------------

/// Exklusiver Besitzer der lokalen Audio-Ressource
pub struct MedienWaechter {
    backend: Arc<dyn AufnahmeBackend>,
    konfig: AufnahmeKonfig,
    aktiv: Mutex<Option<LokaleMedien>>,
}

impl MedienWaechter {
    /// Erstellt einen neuen Waechter ueber dem gegebenen Backend
    pub fn neu(backend: Arc<dyn AufnahmeBackend>, konfig: AufnahmeKonfig) -> Self {
        Self {
            backend,
            konfig,
            aktiv: Mutex::new(None),
        }
    }

    /// Erwirbt die lokale Aufnahme.
    ///
    /// Eine bereits laufende Aufnahme wird vorher freigegeben
    /// (idempotenter Wieder-Erwerb). Schlaegt das Backend fehl, bleibt
    /// der Waechter ohne aktive Aufnahme zurueck.
    pub fn erwerben(&self) -> MedienResult<LokaleMedien> {
        self.freigeben();

        let aufnahme = self.backend.oeffnen(&self.konfig)?;
        let medien = LokaleMedien::neu(aufnahme, self.konfig.clone());
        *self.aktiv.lock() = Some(medien.clone());

        info!(
            sample_rate = self.konfig.sample_rate,
            kanaele = self.konfig.kanaele,
            "Lokale Aufnahme erworben"
        );
        Ok(medien)
    }

    /// Mutet bzw. entmutet die ausgehenden Samples.
    ///
    /// Ohne aktive Aufnahme ein No-Op (wird geloggt).
    pub fn stumm_setzen(&self, stumm: bool) {
        match self.aktiv.lock().as_ref() {
            Some(medien) => {
                medien.stumm_setzen(stumm);
                info!(stumm, "Mikrofon-Mute geaendert");
            }
            None => warn!("Mute ohne aktive Aufnahme ignoriert"),
        }
    }

    /// Gibt true zurueck wenn eine Aufnahme aktiv ist
    pub fn ist_aktiv(&self) -> bool {
        self.aktiv.lock().is_some()
    }

    /// Gibt die Aufnahme frei; idempotent.
    pub fn freigeben(&self) {
        if let Some(medien) = self.aktiv.lock().take() {
            medien.freigeben();
            info!("Lokale Aufnahme freigegeben");
        }
    }
}

impl Drop for MedienWaechter {
    fn drop(&mut self) {
        self.freigeben();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
