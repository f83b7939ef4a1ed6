//! Envelope-Codec fuer WebSocket-Textframes
//!
//! WebSocket-Frames sind bereits abgegrenzt, daher gibt es kein
//! Laengen-Framing – ein Frame entspricht genau einem JSON-Envelope.
//!
//! ## Vorwaertskompatibilitaet
//! Ein unbekannter `type` ist KEIN Deserialisierungsfehler sondern wird
//! als eigener Fehlerwert (`UnbekannterTyp`) gemeldet, damit der Router
//! ihn als No-Op behandeln kann. Nur tatsaechlich fehlerhaftes JSON oder
//! eine defekte Payload eines bekannten Typs gelten als Protokollfehler.

use thiserror::Error;

use crate::envelope::SignalEnvelope;

/// Alle Wire-Typen die dieser Kern versteht
pub const BEKANNTE_TYPEN: [&str; 8] = [
    "chat_message",
    "user_joined",
    "user_left",
    "voice_users_update",
    "offer",
    "answer",
    "ice_candidate",
    "error",
];

/// Fehler beim Kodieren/Dekodieren von Envelopes
#[derive(Debug, Error)]
pub enum CodecFehler {
    /// Frame ist kein gueltiges JSON
    #[error("Ungueltiges JSON: {0}")]
    UngueltigesJson(#[source] serde_json::Error),

    /// JSON-Objekt ohne `type`-Feld
    #[error("Envelope ohne type-Feld")]
    FehlendesTypFeld,

    /// Bekanntes JSON, aber unbekannter Envelope-Typ.
    /// Vorwaertskompatibilitaet: vom Aufrufer als No-Op zu behandeln.
    #[error("Unbekannter Envelope-Typ: {0}")]
    UnbekannterTyp(String),

    /// Bekannter Typ, aber die Payload passt nicht zum Schema
    #[error("Ungueltige Payload fuer Typ {typ}: {quelle}")]
    UngueltigePayload {
        typ: String,
        #[source]
        quelle: serde_json::Error,
    },

    /// Envelope konnte nicht serialisiert werden
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[source] serde_json::Error),
}

impl CodecFehler {
    /// Gibt true zurueck wenn der Frame lediglich ignoriert werden soll
    /// (unbekannter Typ – Vorwaertskompatibilitaets-Vertrag)
    pub fn ist_unbekannter_typ(&self) -> bool {
        matches!(self, CodecFehler::UnbekannterTyp(_))
    }
}

/// Serialisiert ein Envelope in einen WebSocket-Textframe
pub fn kodieren(envelope: &SignalEnvelope) -> Result<String, CodecFehler> {
    serde_json::to_string(envelope).map_err(CodecFehler::Serialisierung)
}

/// Dekodiert einen WebSocket-Textframe in ein typisiertes Envelope
///
/// Prueft zuerst das `type`-Feld, damit unbekannte Typen von defektem
/// JSON unterscheidbar bleiben.
pub fn dekodieren(frame: &str) -> Result<SignalEnvelope, CodecFehler> {
    let wert: serde_json::Value =
        serde_json::from_str(frame).map_err(CodecFehler::UngueltigesJson)?;

    let typ = wert
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(CodecFehler::FehlendesTypFeld)?;

    if !BEKANNTE_TYPEN.contains(&typ) {
        return Err(CodecFehler::UnbekannterTyp(typ.to_string()));
    }

    let typ = typ.to_string();
    serde_json::from_value(wert)
        .map_err(|quelle| CodecFehler::UngueltigePayload { typ, quelle })
}
