//! WebSocket handler
//!
//! Viewers stream camera frames up and receive tracking, transformation and
//! regeneration events down, all as `{"type": ..., "data": ...}` JSON.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use super::shared::SharedStateHandle;
use crate::events::ServerEvent;

/// Messages accepted from viewers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Live frame, tracked only
    Frame { image: String },
    /// Frame to transform, subject to the regeneration gate
    TransformRequest { image: String },
    ToggleAutoRegenerate,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedStateHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: SharedStateHandle) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before greeting so no event slips between the two
    let mut rx = state.subscribe();

    if let Ok(json) = serde_json::to_string(&connected_greeting()) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    tracing::info!("WebSocket client connected");

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => handle_client_message(&recv_state, &text).await,
                Ok(Message::Close(_)) => {
                    tracing::info!("WebSocket client requested close");
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket receive error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("WebSocket client lagged, skipped {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        _ = recv_task => {},
        _ = send_task => {},
    }

    tracing::info!("WebSocket client disconnected");
}

/// First event sent to a newly connected viewer
pub fn connected_greeting() -> ServerEvent {
    ServerEvent::Connected {
        status: "connected".to_string(),
    }
}

/// Route one text message from a viewer. Malformed messages are dropped.
pub async fn handle_client_message(state: &SharedStateHandle, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!("Ignoring malformed WebSocket message: {}", e);
            return;
        }
    };

    match message {
        ClientMessage::Frame { image } => {
            // Errors are already reported to clients by the pipeline
            let _ = state.pipeline.process_frame(&image, false).await;
        }
        ClientMessage::TransformRequest { image } => {
            if let Ok(outcome) = state.pipeline.process_frame(&image, true).await {
                tracing::debug!(?outcome, "Transform request handled");
            }
        }
        ClientMessage::ToggleAutoRegenerate => {
            state.toggle_auto_regenerate();
        }
    }
}
