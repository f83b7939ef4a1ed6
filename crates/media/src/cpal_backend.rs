//! Mikrofon-Aufnahme via cpal
//!
//! Oeffnet einen cpal InputStream und schreibt Samples in einen
//! lock-free Ring-Buffer. Die Verarbeitung laeuft im cpal-Callback.
//!
//! Hinweis: cpal::Stream ist !Send, daher lebt der Stream in einem
//! dedizierten Halter-Thread. Der Consumer wird per sync_channel an den
//! Aufrufer uebergeben; der Stopper signalisiert dem Thread das Ende.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{MedienFehler, MedienResult};
use crate::quelle::AudioQuelle;
use crate::waechter::{Aufnahme, AufnahmeBackend, AufnahmeKonfig};

/// Quelle ueber dem Capture-Ring-Buffer
struct RingQuelle {
    consumer: HeapCons<f32>,
}

impl AudioQuelle for RingQuelle {
    fn lesen(&mut self, ziel: &mut [f32]) -> usize {
        self.consumer.pop_slice(ziel)
    }
}

/// Aufnahme-Backend ueber das Standard-Eingabegeraet des Hosts
pub struct CpalBackend;

impl CpalBackend {
    /// Erstellt das Backend (oeffnet noch kein Geraet)
    pub fn neu() -> Self {
        Self
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::neu()
    }
}

impl AufnahmeBackend for CpalBackend {
    fn oeffnen(&self, konfig: &AufnahmeKonfig) -> MedienResult<Aufnahme> {
        let host = cpal::default_host();
        let geraet = host
            .default_input_device()
            .ok_or_else(|| MedienFehler::NichtVerfuegbar("Kein Eingabegeraet gefunden".into()))?;

        let rb = HeapRb::<f32>::new(konfig.puffer_groesse);
        let (producer, consumer) = rb.split();

        // Der Halter-Thread oeffnet den Stream und meldet das Ergebnis
        // zurueck; danach wartet er nur noch auf das Stopp-Signal.
        let (ergebnis_tx, ergebnis_rx) = mpsc::sync_channel::<MedienResult<()>>(1);
        let (stopp_tx, stopp_rx) = mpsc::channel::<()>();
        let thread_konfig = konfig.clone();

        let halter = std::thread::Builder::new()
            .name("medien-capture".to_string())
            .spawn(move || {
                let stream = match stream_oeffnen(&geraet, &thread_konfig, producer) {
                    Ok(stream) => {
                        let _ = ergebnis_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ergebnis_tx.send(Err(e));
                        return;
                    }
                };

                // Stream lebt bis das Stopp-Signal kommt (oder der Sender faellt)
                let _ = stopp_rx.recv();
                drop(stream);
                debug!("Capture-Stream geschlossen");
            })
            .map_err(|e| MedienFehler::Stream(format!("Halter-Thread: {}", e)))?;

        match ergebnis_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = halter.join();
                return Err(e);
            }
            Err(_) => {
                let _ = halter.join();
                return Err(MedienFehler::Stream(
                    "Halter-Thread ohne Ergebnis beendet".into(),
                ));
            }
        }

        debug!(
            sample_rate = konfig.sample_rate,
            kanaele = konfig.kanaele,
            "Capture-Stream geoeffnet"
        );

        Ok(Aufnahme {
            quelle: Box::new(RingQuelle { consumer }),
            stopper: Box::new(move || {
                let _ = stopp_tx.send(());
                let _ = halter.join();
            }),
        })
    }
}

/// Oeffnet den InputStream auf dem Geraet; laeuft im Halter-Thread
fn stream_oeffnen(
    geraet: &Device,
    konfig: &AufnahmeKonfig,
    mut producer: ringbuf::HeapProd<f32>,
) -> MedienResult<cpal::Stream> {
    let stream_config = StreamConfig {
        channels: konfig.kanaele,
        sample_rate: cpal::SampleRate(konfig.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!("Capture-Fehler: {}", err);

    // Unterstuetzte Sample-Formate pruefen
    let unterstuetzt = geraet
        .supported_input_configs()
        .map_err(|e| MedienFehler::Stream(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= konfig.sample_rate
                && c.max_sample_rate().0 >= konfig.sample_rate
                && c.channels() >= konfig.kanaele
        });

    let sample_format = unterstuetzt
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => geraet
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _| {
                    let geschrieben = producer.push_slice(data);
                    if geschrieben < data.len() {
                        warn!(
                            "Capture Ring-Buffer voll, {} Samples verworfen",
                            data.len() - geschrieben
                        );
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| MedienFehler::Stream(e.to_string()))?,
        SampleFormat::I16 => geraet
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    let geschrieben = producer.push_slice(&floats);
                    if geschrieben < floats.len() {
                        warn!("Capture Ring-Buffer voll");
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| MedienFehler::Stream(e.to_string()))?,
        _ => {
            return Err(MedienFehler::Stream(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| MedienFehler::Stream(e.to_string()))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waechter::{AufnahmeKonfig, MedienWaechter};
    use std::sync::Arc;

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn cpal_aufnahme_oeffnen_und_freigeben() {
        let waechter = Arc::new(MedienWaechter::neu(
            Arc::new(CpalBackend::neu()),
            AufnahmeKonfig::default(),
        ));
        let medien = waechter.erwerben().expect("Aufnahme sollte starten");
        assert!(waechter.ist_aktiv());

        std::thread::sleep(std::time::Duration::from_millis(100));
        let mut ziel = [0.0f32; 960];
        let _ = medien.lesen(&mut ziel);

        waechter.freigeben();
        assert!(!waechter.ist_aktiv());
    }
}
