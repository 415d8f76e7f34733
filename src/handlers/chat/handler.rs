//! Chat WebSocket handler
//!
//! Bridges one client connection to the shared conversation session: the
//! session's outbound stream is attached to this socket for the lifetime of
//! the connection, inbound envelopes are routed into the text and voice paths.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::session::OutboundMessage;
use crate::middleware::Auth;
use crate::state::AppState;
use crate::utils::spawn_guarded;

use super::messages::ChatIncomingMessage;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Chat WebSocket handler
///
/// Rejects the upgrade with 400 when `userId` is missing or empty.
pub async fn chat_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Query(query): Query<ChatQuery>,
) -> Response {
    let Some(user_id) = query
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        warn!("Chat connection rejected: missing userId");
        return (StatusCode::BAD_REQUEST, "Missing 'userId' parameter").into_response();
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(user_id = %user_id, "Chat upgrade rejected: {}", rejection);
            return rejection.into_response();
        }
    };

    info!(user_id = %user_id, auth_id = ?auth.id, "Chat WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_chat_socket(socket, state, user_id))
}

async fn handle_chat_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: String) {
    info!(user_id = %user_id, "Chat WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) =
        mpsc::channel::<OutboundMessage>(app_state.config.outbound_queue_capacity.max(1));
    let attachment = app_state.session.attach_outbound(message_tx);

    let send_user = user_id.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(message) = message_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                warn!(user_id = %send_user, "Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    loop {
        select! {
            msg_result = receiver.next() => {
                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_chat_message(msg, &user_id, &app_state) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(user_id = %user_id, "Chat WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(user_id = %user_id, "Chat WebSocket closed by client");
                        break;
                    }
                }
            }
            _ = &mut sender_task => {
                info!(user_id = %user_id, "Chat send loop ended");
                break;
            }
        }
    }

    // Cleanup
    app_state.session.detach_outbound(attachment);
    sender_task.abort();

    info!(user_id = %user_id, "Chat WebSocket connection terminated");
}

/// Route one frame. Returns `false` when the connection should close.
fn process_chat_message(msg: Message, user_id: &str, app_state: &Arc<AppState>) -> bool {
    match msg {
        Message::Text(text) => {
            debug!(user_id = %user_id, "Received text frame: {} bytes", text.len());
            match serde_json::from_str::<ChatIncomingMessage>(&text) {
                Ok(incoming) => handle_incoming(incoming.with_default_user(user_id), app_state),
                Err(e) => warn!(user_id = %user_id, "Ignoring undecodable chat message: {}", e),
            }
            true
        }
        Message::Binary(data) => {
            debug!(user_id = %user_id, "Ignoring binary frame: {} bytes", data.len());
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!(user_id = %user_id, "Chat WebSocket close received");
            false
        }
    }
}

fn handle_incoming(incoming: ChatIncomingMessage, app_state: &Arc<AppState>) {
    match incoming {
        ChatIncomingMessage::Text(msg) => {
            let session = app_state.session.clone();
            let voice_reply = app_state.config.voice_replies_for_text;
            spawn_guarded("chat-text", async move {
                session
                    .handle_text(&msg.user_id, &msg.item_id, &msg.content, voice_reply)
                    .await;
            });
        }
        ChatIncomingMessage::Voice(msg) => {
            let user_id = msg.user_id.clone();
            let item_id = msg.item_id.clone();
            if let Err(e) = app_state.session.enqueue_voice(msg.into()) {
                warn!(user_id = %user_id, item_id = %item_id, "Voice chunk dropped: {}", e);
            }
        }
    }
}
