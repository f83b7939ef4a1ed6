//! WebSocket-Transport via tokio-tungstenite
//!
//! Der Directory Service exponiert pro Kanal und Verbindungsart einen
//! WebSocket-Endpunkt; das Token wird als Query-Parameter mitgegeben:
//!
//! ```text
//! ws://host/ws/chat/{kanal_id}?token=...
//! ws://host/ws/voice/{kanal_id}?token=...
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use palaver_core::error::{PalaverError, Result};
use palaver_core::types::{KanalId, Verbindungsart};

use crate::transport::{SignalTransport, Verbinder};

/// Baut die Endpunkt-URL fuer einen Kanal-Beitritt
pub fn kanal_url(basis: &str, art: Verbindungsart, kanal: KanalId, token: &str) -> String {
    let segment = match art {
        Verbindungsart::Text => "chat",
        Verbindungsart::Voice => "voice",
    };
    format!(
        "{}/ws/{}/{}?token={}",
        basis.trim_end_matches('/'),
        segment,
        kanal.inner(),
        token
    )
}

/// Verbinder ueber tokio-tungstenite
pub struct WsVerbinder;

#[async_trait]
impl Verbinder for WsVerbinder {
    async fn verbinden(&self, url: &str) -> Result<Box<dyn SignalTransport>> {
        let (stream, _antwort) = connect_async(url)
            .await
            .map_err(|e| PalaverError::Transport(e.to_string()))?;
        debug!(url, "WebSocket verbunden");
        Ok(Box::new(WsTransport { stream }))
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SignalTransport for WsTransport {
    async fn senden(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| PalaverError::Transport(e.to_string()))
    }

    async fn empfangen(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(andere)) => {
                    // Ping/Pong beantwortet tungstenite selbst; Binary wird
                    // auf dieser Verbindung nicht gesprochen
                    trace!(frame = ?andere, "Nicht-Text-Frame uebersprungen");
                }
                Some(Err(e)) => return Some(Err(PalaverError::Transport(e.to_string()))),
            }
        }
    }

    async fn schliessen(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_fuer_text_kanal() {
        let url = kanal_url("ws://localhost:8000", Verbindungsart::Text, KanalId(42), "tok");
        assert_eq!(url, "ws://localhost:8000/ws/chat/42?token=tok");
    }

    #[test]
    fn url_fuer_voice_kanal_ohne_doppelten_slash() {
        let url = kanal_url("ws://host/", Verbindungsart::Voice, KanalId(7), "abc");
        assert_eq!(url, "ws://host/ws/voice/7?token=abc");
    }
}
