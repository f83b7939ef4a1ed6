//! Signal-Envelopes (WebSocket, JSON)
//!
//! Definiert alle typisierten Envelopes die ueber die beiden
//! Signal-Verbindungen (Text und Voice) ausgetauscht werden.
//!
//! ## Design
//! - Tagged Enum: das Feld `type` bestimmt die Variante (snake_case)
//! - Text-Envelopes tragen ihre Nutzdaten unter `data`
//! - Signalisierungs-Envelopes (`offer`/`answer`/`ice_candidate`) tragen
//!   `target`, `from` und `signal` auf oberster Ebene – `signal` ist ein
//!   opakes Verhandlungs-Payload das der Kern nie interpretiert
//! - Jedes Envelope ist unveraenderlich und wird pro Nachricht konstruiert

use palaver_core::types::{KanalId, NachrichtenId, TeilnehmerId};
use serde::{Deserialize, Serialize};

/// Opakes Verhandlungs-Payload (SDP, ICE-Kandidaten etc.)
///
/// Wird unveraendert zwischen PeerTransport und Gegenstelle durchgereicht.
pub type SignalDaten = serde_json::Value;

// ---------------------------------------------------------------------------
// Nutzdaten-Strukturen
// ---------------------------------------------------------------------------

/// Teilnehmer-Info wie sie der Directory Service liefert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: TeilnehmerId,
    pub username: String,
}

/// Chat-Nachricht
///
/// Eingehend liefert der Server alle Felder; ausgehend wird nur `content`
/// gesendet, daher sind die uebrigen Felder optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatNachricht {
    /// Nachrichten-ID (fuer Deduplizierung; fehlt bei ausgehenden Nachrichten)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NachrichtenId>,
    /// Nachrichtentext
    pub content: String,
    /// Absender-ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<TeilnehmerId>,
    /// Absender-Name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Kanal in dem die Nachricht gesendet wurde
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<KanalId>,
    /// Erstellungszeitpunkt (ISO-8601-String vom Directory Service, opak)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Join/Leave-Ereignis auf der Text-Verbindung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanalEreignis {
    pub channel_id: KanalId,
    pub user: UserInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Praesenz-Roster eines Voice-Kanals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRoster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<KanalId>,
    pub users: Vec<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Fehlermeldung vom Server (z.B. bei fehlerhaftem Client-JSON)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FehlerMeldung {
    pub message: String,
}

// ---------------------------------------------------------------------------
// SignalEnvelope
// ---------------------------------------------------------------------------

/// Typisiertes Envelope fuer beide Signal-Verbindungen
///
/// Text-Verbindung: `ChatMessage`, `UserJoined`, `UserLeft`.
/// Voice-Verbindung: `VoiceUsersUpdate`, `Offer`, `Answer`, `IceCandidate`.
/// `ServerFehler` kann auf beiden ankommen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalEnvelope {
    ChatMessage {
        data: ChatNachricht,
    },
    UserJoined {
        data: KanalEreignis,
    },
    UserLeft {
        data: KanalEreignis,
    },
    VoiceUsersUpdate {
        data: VoiceRoster,
    },
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TeilnehmerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<UserInfo>,
        signal: SignalDaten,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TeilnehmerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<UserInfo>,
        signal: SignalDaten,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TeilnehmerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<UserInfo>,
        signal: SignalDaten,
    },
    #[serde(rename = "error")]
    ServerFehler {
        data: FehlerMeldung,
    },
}

impl SignalEnvelope {
    /// Ausgehende Chat-Nachricht – auf dem Draht nur `content`
    pub fn chat_senden(content: impl Into<String>) -> Self {
        SignalEnvelope::ChatMessage {
            data: ChatNachricht {
                id: None,
                content: content.into(),
                user_id: None,
                username: None,
                channel_id: None,
                created_at: None,
            },
        }
    }

    /// Ausgehendes Offer an einen bestimmten Teilnehmer
    pub fn offer(target: TeilnehmerId, signal: SignalDaten) -> Self {
        SignalEnvelope::Offer {
            target: Some(target),
            from: None,
            signal,
        }
    }

    /// Ausgehende Answer an einen bestimmten Teilnehmer
    pub fn answer(target: TeilnehmerId, signal: SignalDaten) -> Self {
        SignalEnvelope::Answer {
            target: Some(target),
            from: None,
            signal,
        }
    }

    /// Ausgehender ICE-Kandidat an einen bestimmten Teilnehmer
    pub fn ice_kandidat(target: TeilnehmerId, signal: SignalDaten) -> Self {
        SignalEnvelope::IceCandidate {
            target: Some(target),
            from: None,
            signal,
        }
    }

    /// Gibt den Wire-Typ-Namen der Variante zurueck (fuer Logging)
    pub fn typ_name(&self) -> &'static str {
        match self {
            SignalEnvelope::ChatMessage { .. } => "chat_message",
            SignalEnvelope::UserJoined { .. } => "user_joined",
            SignalEnvelope::UserLeft { .. } => "user_left",
            SignalEnvelope::VoiceUsersUpdate { .. } => "voice_users_update",
            SignalEnvelope::Offer { .. } => "offer",
            SignalEnvelope::Answer { .. } => "answer",
            SignalEnvelope::IceCandidate { .. } => "ice_candidate",
            SignalEnvelope::ServerFehler { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_nachricht_eingehend_alle_felder() {
        // Exakte Server-Payload des Directory-Service-Backends
        let json = r#"{
            "type": "chat_message",
            "data": {
                "id": 17,
                "content": "hallo",
                "user_id": 3,
                "username": "anna",
                "channel_id": 42,
                "created_at": "2024-05-01T12:00:00"
            }
        }"#;
        let env: SignalEnvelope = serde_json::from_str(json).unwrap();
        match env {
            SignalEnvelope::ChatMessage { data } => {
                assert_eq!(data.id, Some(NachrichtenId(17)));
                assert_eq!(data.content, "hallo");
                assert_eq!(data.user_id, Some(TeilnehmerId(3)));
                assert_eq!(data.username.as_deref(), Some("anna"));
                assert_eq!(data.channel_id, Some(KanalId(42)));
            }
            other => panic!("Erwartet ChatMessage, erhalten: {:?}", other),
        }
    }

    #[test]
    fn chat_nachricht_ausgehend_nur_content() {
        let env = SignalEnvelope::chat_senden("hi");
        let wert = serde_json::to_value(&env).unwrap();
        assert_eq!(
            wert,
            json!({ "type": "chat_message", "data": { "content": "hi" } })
        );
    }

    #[test]
    fn user_joined_und_left() {
        let json = r#"{
            "type": "user_joined",
            "data": {
                "channel_id": 5,
                "user": { "id": 9, "username": "ben" },
                "timestamp": "2024-05-01T12:00:00"
            }
        }"#;
        let env: SignalEnvelope = serde_json::from_str(json).unwrap();
        assert!(matches!(env, SignalEnvelope::UserJoined { .. }));
        assert_eq!(env.typ_name(), "user_joined");
    }

    #[test]
    fn voice_users_update_mit_und_ohne_metadaten() {
        let voll = r#"{
            "type": "voice_users_update",
            "data": {
                "channel_id": 42,
                "users": [ { "id": 1, "username": "a" }, { "id": 2, "username": "b" } ],
                "timestamp": "2024-05-01T12:00:00"
            }
        }"#;
        let env: SignalEnvelope = serde_json::from_str(voll).unwrap();
        match &env {
            SignalEnvelope::VoiceUsersUpdate { data } => assert_eq!(data.users.len(), 2),
            other => panic!("Erwartet VoiceUsersUpdate, erhalten: {:?}", other),
        }

        // channel_id/timestamp duerfen fehlen
        let knapp = r#"{ "type": "voice_users_update", "data": { "users": [] } }"#;
        let env: SignalEnvelope = serde_json::from_str(knapp).unwrap();
        assert!(matches!(env, SignalEnvelope::VoiceUsersUpdate { .. }));
    }

    #[test]
    fn offer_eingehend_mit_from() {
        let json = r#"{
            "type": "offer",
            "from": { "id": 2, "username": "ben" },
            "signal": { "sdp": "v=0...", "type": "offer" }
        }"#;
        let env: SignalEnvelope = serde_json::from_str(json).unwrap();
        match env {
            SignalEnvelope::Offer { target, from, signal } => {
                assert!(target.is_none());
                assert_eq!(from.unwrap().id, TeilnehmerId(2));
                assert_eq!(signal["sdp"], "v=0...");
            }
            other => panic!("Erwartet Offer, erhalten: {:?}", other),
        }
    }

    #[test]
    fn offer_ausgehend_mit_target() {
        let env = SignalEnvelope::offer(TeilnehmerId(2), json!({ "sdp": "x" }));
        let wert = serde_json::to_value(&env).unwrap();
        assert_eq!(
            wert,
            json!({ "type": "offer", "target": 2, "signal": { "sdp": "x" } })
        );
    }

    #[test]
    fn ice_candidate_tag_ist_snake_case() {
        let env = SignalEnvelope::ice_kandidat(TeilnehmerId(7), json!({ "candidate": "c" }));
        let text = serde_json::to_string(&env).unwrap();
        assert!(text.contains("\"ice_candidate\""));
        let zurueck: SignalEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(env, zurueck);
    }

    #[test]
    fn server_fehler_envelope() {
        let json = r#"{ "type": "error", "data": { "message": "Invalid JSON format" } }"#;
        let env: SignalEnvelope = serde_json::from_str(json).unwrap();
        match env {
            SignalEnvelope::ServerFehler { data } => {
                assert_eq!(data.message, "Invalid JSON format")
            }
            other => panic!("Erwartet ServerFehler, erhalten: {:?}", other),
        }
    }
}
