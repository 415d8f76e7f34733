use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
///
/// Authentication middleware is applied by [`super::create_app`].
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tools", get(api::list_tools))
        .route("/progress", get(api::list_progress))
        .layer(TraceLayer::new_for_http())
}
