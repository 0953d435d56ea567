//! Websocket transport for the option-chain stream
//!
//! Opens the connection in a background task and forwards frames to the
//! owning `Connection`. Never reconnects on its own.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::config;
use super::subscription::{Connection, StreamConnector, StreamEvent};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct WsConnector {
    channel_size: usize,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            channel_size: config::STREAM_CHANNEL_SIZE,
        }
    }

    pub fn with_channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConnector for WsConnector {
    /// Must be called from within a tokio runtime.
    fn open(&self, url: &str) -> Connection {
        let (event_tx, event_rx) = mpsc::channel(self.channel_size);
        let url = url.to_string();
        let task = tokio::spawn(run_connection(url, event_tx));
        Connection::new(event_rx, Some(task))
    }
}

async fn run_connection(url: String, event_tx: mpsc::Sender<StreamEvent>) {
    let mut stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            let _ = event_tx
                .send(StreamEvent::Error(TransportError::Connect {
                    url,
                    reason: e.to_string(),
                }))
                .await;
            return;
        }
    };

    info!("Connected to option-chain stream at {}", url);
    if event_tx.send(StreamEvent::Opened).await.is_err() {
        return;
    }

    while let Some(msg) = stream.next().await {
        let event = match msg {
            Ok(Message::Text(text)) => StreamEvent::Frame(text.as_str().to_owned()),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => StreamEvent::Frame(text),
                Err(e) => {
                    warn!("Dropping non UTF-8 binary frame: {}", e);
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                info!("Server closed stream: {:?}", frame);
                let _ = event_tx.send(StreamEvent::Closed).await;
                return;
            }
            // tungstenite answers pings itself
            Ok(_) => continue,
            Err(e) => {
                error!("Stream error: {}", e);
                let _ = event_tx
                    .send(StreamEvent::Error(TransportError::Dropped(e.to_string())))
                    .await;
                return;
            }
        };

        if event_tx.send(event).await.is_err() {
            debug!("Connection owner dropped, stopping reader");
            return;
        }
    }

    let _ = event_tx
        .send(StreamEvent::Error(TransportError::Dropped(
            "stream ended without close frame".to_string(),
        )))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_reports_connect_error() {
        let connector = WsConnector::new().with_channel_size(4);
        // port 9 (discard) is not a websocket server
        let mut connection = connector.open("ws://127.0.0.1:9/ws/chain");

        match connection.recv().await {
            Some(StreamEvent::Error(TransportError::Connect { url, .. })) => {
                assert_eq!(url, "ws://127.0.0.1:9/ws/chain");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
