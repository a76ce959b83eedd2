//! Live reload channel
//!
//! Connected browsers subscribe over a websocket; the stylesheet build and
//! the `browser-sync-reload` task publish into it.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::ServerState;

/// Messages pushed to connected browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Stylesheet rebuilt; swap it in place
    CssUpdate { path: String },

    /// Full page reload required
    FullReload { reason: String },
}

/// Broadcast handle shared by the build steps and the dev server
#[derive(Debug, Clone)]
pub struct ReloadChannel {
    tx: broadcast::Sender<ReloadMessage>,
}

impl ReloadChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    /// Send to every connected browser; returns how many received it
    pub fn publish(&self, message: ReloadMessage) -> usize {
        match self.tx.send(message) {
            Ok(count) => count,
            // No subscribers, nothing is serving
            Err(_) => 0,
        }
    }

    /// Number of connected browsers
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }
}

impl Default for ReloadChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle WebSocket upgrade for live reload
pub(crate) async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_reload_socket(socket, state))
}

/// Forward channel messages to one browser until either side hangs up
async fn handle_reload_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut reload_rx = state.reload.subscribe();

    if let Ok(json) = serde_json::to_string(&ReloadMessage::Connected) {
        let _ = sender.send(Message::Text(json)).await;
    }

    debug!("Reload client connected ({} total)", state.reload.client_count());

    let send_task = tokio::spawn(async move {
        loop {
            match reload_rx.recv().await {
                Ok(message) => {
                    let Ok(json) = serde_json::to_string(&message) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Reload client lagged by {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    debug!("Reload client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let css = serde_json::to_string(&ReloadMessage::CssUpdate {
            path: "app.css".to_string(),
        })
        .unwrap();
        let full = serde_json::to_string(&ReloadMessage::FullReload {
            reason: "templates rebuilt".to_string(),
        })
        .unwrap();

        assert_eq!(css, r#"{"type":"css-update","path":"app.css"}"#);
        assert_eq!(full, r#"{"type":"full-reload","reason":"templates rebuilt"}"#);
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Connected).unwrap(),
            r#"{"type":"connected"}"#
        );
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let channel = ReloadChannel::new();
        assert_eq!(channel.publish(ReloadMessage::Connected), 0);

        let mut rx = channel.subscribe();
        let sent = channel.publish(ReloadMessage::FullReload {
            reason: "test".to_string(),
        });

        assert_eq!(sent, 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            ReloadMessage::FullReload {
                reason: "test".to_string()
            }
        );
    }
}
