mod common;

use axum::http::StatusCode;
use axum_test::TestServer;

use switchboard::config::Config;
use switchboard::session::TransportKind;

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok_with_no_sessions() {
    let state = common::test_state(Config::default());
    let app = switchboard::routes::router().with_state(state);
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/health").await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn health_counts_registered_sessions() {
    let state = common::test_state(Config::default());
    let first = state
        .sessions
        .create(TransportKind::Websocket, common::handshake());
    state
        .sessions
        .create(TransportKind::Websocket, common::handshake());
    let server = TestServer::new(switchboard::routes::router().with_state(state.clone())).unwrap();

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["sessions"], 2);

    state.sessions.remove(first.id());
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["sessions"], 1);
}

#[tokio::test]
async fn socket_route_requires_upgrade() {
    let state = common::test_state(Config::default());
    let server = TestServer::new(switchboard::routes::router().with_state(state)).unwrap();

    let resp = server.get("/socket").await;
    assert_ne!(resp.status_code(), StatusCode::OK);
}
