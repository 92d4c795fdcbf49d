use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{info, warn};

use crate::dynamics::types::ControllerInput;
use crate::state::SharedRaceState;

// ============================================
// Viewer -> server messages
// ============================================
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Input {
        #[serde(default)]
        turn: f32,
        #[serde(default)]
        accelerate: f32,
        #[serde(default)]
        brake: f32,
        #[serde(default)]
        reset: bool,
        #[serde(default)]
        jump: bool,
    },
    Ping,
}

impl ClientMessage {
    pub fn from_json(txt: &str) -> Result<Self> {
        serde_json::from_str(txt).with_context(|| format!("bad viewer message: {txt}"))
    }
}

pub async fn start_websocket_server(state: Arc<Mutex<SharedRaceState>>, bind: String) -> Result<()> {
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind WebSocket port {bind}"))?;

    info!("WebSocket listening on ws://{bind}");

    loop {
        let (raw, addr) = listener.accept().await.context("accepting connection")?;
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(err) = handle_viewer(raw, state).await {
                warn!(%addr, "viewer connection ended: {err:#}");
            }
        });
    }
}

async fn handle_viewer(raw: TcpStream, state: Arc<Mutex<SharedRaceState>>) -> Result<()> {
    let ws = accept_async(raw).await.context("WebSocket handshake")?;
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let viewer_id = state.lock().await.register_client(tx.clone());

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    info!(%viewer_id, "viewer connected");

    let welcome = serde_json::json!({ "type": "welcome", "viewer_id": viewer_id });
    let _ = tx.send(welcome.to_string());

    // -------------------------------
    // 2) Receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else { continue };

        match ClientMessage::from_json(text) {
            Ok(ClientMessage::Ping) => {
                let _ = tx.send(r#"{"type":"pong"}"#.to_string());
            }
            Ok(ClientMessage::Input { turn, accelerate, brake, reset, jump }) => {
                let input = ControllerInput { turn, accelerate, brake, reset, jump };
                state.lock().await.update_input(viewer_id, input);
            }
            Err(err) => warn!(%viewer_id, "{err:#}"),
        }
    }

    info!(%viewer_id, "viewer disconnected");
    state.lock().await.remove_client(&viewer_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_input_and_ping() {
        let msg = ClientMessage::from_json(r#"{"type":"input","turn":-0.5,"accelerate":1,"reset":true}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input { turn: -0.5, accelerate: 1.0, brake: 0.0, reset: true, jump: false }
        );
        assert_eq!(ClientMessage::from_json(r#"{"type":"ping"}"#).unwrap(), ClientMessage::Ping);
    }

    #[test]
    fn rejects_unknown_messages() {
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMessage::from_json("{").is_err());
    }
}
