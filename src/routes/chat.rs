//! Chat WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::chat_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the chat WebSocket router
///
/// # Endpoint
///
/// `GET /chat?userId=<id>` - WebSocket upgrade for text and voice conversation
///
/// # Example
///
/// ```json
/// // Client sends a typed message
/// {"type": "chat.completions", "userId": "u1", "itemId": "item_1", "content": "transcode demo.mp4 to 720p", "timestamp": 1700000000000}
///
/// // Server replies
/// {"type": "chat.completions", "userId": "ai", "itemId": "item_1", "role": "assistant", "content": "Transcode started ...", "timestamp": 1700000000420}
/// ```
pub fn create_chat_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", get(chat_handler))
        .layer(TraceLayer::new_for_http())
}
