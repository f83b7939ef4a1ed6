//! Audio-Quellen-Abstraktion
//!
//! Eine `AudioQuelle` liefert PCM-Samples (f32, interleaved) im Pull-Modus.
//! Lokale Aufnahmen und entfernte Medien-Stroeme (vom PeerTransport
//! geliefert) implementieren dasselbe Trait, damit die Audio-Senke der
//! UI-Schicht beide gleich behandeln kann.

/// Pull-basierte PCM-Quelle
pub trait AudioQuelle: Send {
    /// Liest bis zu `ziel.len()` Samples in den Puffer.
    ///
    /// Gibt die Anzahl der geschriebenen Samples zurueck. 0 bedeutet:
    /// momentan nichts verfuegbar oder die Quelle ist beendet.
    fn lesen(&mut self, ziel: &mut [f32]) -> usize;
}

/// Entfernter Medien-Strom wie ihn der PeerTransport nach erfolgreicher
/// Verhandlung liefert – fuer den Kern opak, nur durchgereicht.
pub type RemoteAudio = Box<dyn AudioQuelle>;

/// Statische Quelle aus einem vorab befuellten Puffer (Tests, Einspielungen)
pub struct PufferQuelle {
    samples: Vec<f32>,
    position: usize,
}

impl PufferQuelle {
    /// Erstellt eine Quelle ueber den gegebenen Samples
    pub fn neu(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }
}

impl AudioQuelle for PufferQuelle {
    fn lesen(&mut self, ziel: &mut [f32]) -> usize {
        let rest = self.samples.len().saturating_sub(self.position);
        let n = rest.min(ziel.len());
        ziel[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn puffer_quelle_liest_sequenziell() {
        let mut quelle = PufferQuelle::neu(vec![0.1, 0.2, 0.3]);
        let mut ziel = [0.0f32; 2];
        assert_eq!(quelle.lesen(&mut ziel), 2);
        assert_eq!(ziel, [0.1, 0.2]);
        assert_eq!(quelle.lesen(&mut ziel), 1);
        assert_eq!(ziel[0], 0.3);
        assert_eq!(quelle.lesen(&mut ziel), 0, "Leere Quelle liefert 0");
    }
}
