use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Identity attached to every request by [`auth_middleware`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    /// Caller id, taken from the `userId` query parameter when present
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

fn user_id_from_query(request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == "userId" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Accept-all authentication.
///
/// Every request is let through; handlers that need an identity read the
/// [`Auth`] extension inserted here.
pub async fn auth_middleware(
    State(_state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = match user_id_from_query(&request) {
        Some(id) => Auth::new(id),
        None => Auth::anonymous(),
    };
    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        auth_id = ?auth.id,
        "Request accepted"
    );
    request.extensions_mut().insert(auth);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_user_id_from_query() {
        let request = Request::builder()
            .uri("/chat?userId=u%201&x=2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(user_id_from_query(&request).as_deref(), Some("u 1"));

        let request = Request::builder()
            .uri("/chat?userId=")
            .body(Body::empty())
            .unwrap();
        assert_eq!(user_id_from_query(&request), None);

        let request = Request::builder().uri("/chat").body(Body::empty()).unwrap();
        assert_eq!(user_id_from_query(&request), None);
    }
}
