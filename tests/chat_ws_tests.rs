//! Router tests: public and protected HTTP routes plus a live chat socket.

mod mock_backend;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use futures::{SinkExt, StreamExt};
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tower::ServiceExt;

use voice_agent_gateway::core::progress::{ProgressReporter, ProgressSnapshot};
use voice_agent_gateway::core::session::OutboundMessage;
use voice_agent_gateway::core::speech::DisabledSpeechFactory;
use voice_agent_gateway::{AppState, routes};

use mock_backend::{ScriptedBackend, test_config};

fn app_state(backend: Arc<ScriptedBackend>) -> Arc<AppState> {
    AppState::with_components(test_config(), backend, Arc::new(DisabledSpeechFactory))
}

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn read_json(socket: &mut ClientSocket) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("no frame from server")
        .unwrap()
        .unwrap();
    serde_json::from_str(frame.to_text().unwrap()).unwrap()
}

async fn body_string(body: Body) -> String {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check_sets_security_headers() {
    let app = routes::create_app(app_state(ScriptedBackend::new()));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_string(response.into_body()).await, "OK");
}

#[tokio::test]
async fn test_chat_requires_user_id() {
    for uri in ["/chat", "/chat?userId="] {
        let app = routes::create_app(app_state(ScriptedBackend::new()));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
        assert_eq!(
            body_string(response.into_body()).await,
            "Missing 'userId' parameter"
        );
    }
}

#[tokio::test]
async fn test_chat_without_upgrade_is_rejected() {
    let app = routes::create_app(app_state(ScriptedBackend::new()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/chat?userId=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_tools_endpoint_lists_registry() {
    let app = routes::create_app(app_state(ScriptedBackend::new()));
    let response = app
        .oneshot(Request::builder().uri("/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response.into_body()).await;
    let tools: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(tools.len(), 12);
    let weather = tools
        .iter()
        .find(|t| t["name"] == "get_current_weather")
        .unwrap();
    assert_eq!(weather["user_facing"], false);
}

#[tokio::test]
async fn test_progress_endpoint_reports_tasks() {
    let state = app_state(ScriptedBackend::new());
    state
        .progress
        .report("call_b", ProgressSnapshot::new(0.25, "transcoding", false));
    state
        .progress
        .report("call_a", ProgressSnapshot::new(1.0, "transcode done", true));

    let app = routes::create_app(state);
    let response = app
        .oneshot(Request::builder().uri("/progress").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response.into_body()).await;
    let tasks: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["task_id"], "call_a");
    assert_eq!(tasks[0]["done"], true);
    assert_eq!(tasks[1]["task_id"], "call_b");
    assert_eq!(tasks[1]["message"], "transcoding");
}

#[tokio::test]
async fn test_chat_socket_round_trip() {
    let backend = ScriptedBackend::new();
    backend.push_text("Hello **there**");
    let app = routes::create_app(app_state(backend.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let (mut socket, _) = connect_async(format!("ws://{addr}/chat?userId=u1"))
        .await
        .unwrap();

    // Undecodable frames are skipped without closing the connection
    socket.send(Message::text("not json")).await.unwrap();

    let envelope = json!({
        "type": "chat.completions",
        "userId": "u1",
        "itemId": "item_1",
        "role": "user",
        "content": "hi",
    });
    socket
        .send(Message::text(envelope.to_string()))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("no reply from server")
        .unwrap()
        .unwrap();
    let reply: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(reply["type"], "chat.completions");
    assert_eq!(reply["itemId"], "item_1");
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "Hello there");
    assert!(reply.get("done").is_none());

    assert_eq!(backend.request_count(), 1);
    assert_eq!(backend.requests()[0].messages[0].role.to_string(), "user");

    socket.close(None).await.unwrap();
    server.abort();
}

#[tokio::test]
async fn test_socket_frames_follow_issue_order() {
    let backend = ScriptedBackend::new();
    backend.push_text("ready");
    let state = app_state(backend);
    let app = routes::create_app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let (mut socket, _) = connect_async(format!("ws://{addr}/chat?userId=u1"))
        .await
        .unwrap();

    // A first reply proves the connection is attached
    let envelope = json!({
        "type": "chat.completions",
        "userId": "u1",
        "itemId": "item_0",
        "content": "hi",
    });
    socket
        .send(Message::text(envelope.to_string()))
        .await
        .unwrap();

    assert_eq!(read_json(&mut socket).await["content"], "ready");

    let issued = [
        OutboundMessage::assistant_text("m1", "first"),
        OutboundMessage::assistant_voice("m2", "AAEC".to_string(), false),
        OutboundMessage::assistant_text("m3", "third"),
    ];
    for message in issued {
        let session = state.session.clone();
        let published = tokio::spawn(async move { session.publish(message) })
            .await
            .unwrap();
        assert!(published);
    }

    let mut frames = Vec::new();
    for _ in 0..3 {
        frames.push(read_json(&mut socket).await);
    }
    let order: Vec<_> = frames
        .iter()
        .map(|f| (f["itemId"].as_str().unwrap(), f["type"].as_str().unwrap()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("m1", "chat.completions"),
            ("m2", "chat.voice"),
            ("m3", "chat.completions"),
        ]
    );
    assert_eq!(frames[1]["content"], "AAEC");
    assert_eq!(frames[1]["done"], false);

    server.abort();
}
