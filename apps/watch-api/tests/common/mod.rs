#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use watch_api::config::Config;
use watch_api::AppState;

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a test AppState with default configuration and empty stores.
pub fn test_state() -> AppState {
    AppState::new(Config::default())
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = watch_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the background.
pub async fn start_ws_server(state: AppState) -> SocketAddr {
    let app = watch_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Connect to the gateway, IDENTIFY, and consume READY.
/// Returns the stream and the READY payload.
pub async fn connect_and_identify(addr: SocketAddr, user_id: &str, user_name: &str) -> (Ws, Value) {
    let url = format!("ws://{addr}/gateway");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let identify = serde_json::json!({
        "op": 2,
        "d": { "userId": user_id, "userName": user_name }
    });
    ws.send(tungstenite::Message::Text(identify.to_string().into()))
        .await
        .expect("send identify");

    let (name, data) = next_event(&mut ws).await;
    assert_eq!(name, "ready");
    (ws, data)
}

/// Send a DISPATCH frame.
pub async fn send_event(ws: &mut Ws, name: &str, data: Value) {
    let frame = serde_json::json!({ "op": 0, "t": name, "d": data });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send event");
}

/// Read frames until the next DISPATCH and return its `(t, d)`.
pub async fn next_event(ws: &mut Ws) -> (String, Value) {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");

        let text = match msg {
            tungstenite::Message::Text(t) => t,
            tungstenite::Message::Close(frame) => panic!("connection closed: {frame:?}"),
            _ => continue,
        };
        let value: Value = serde_json::from_str(&text).expect("parse frame");
        if value["op"] == 0 {
            let name = value["t"].as_str().expect("event name").to_string();
            return (name, value["d"].clone());
        }
    }
}

/// Assert no DISPATCH arrives within a short window.
pub async fn expect_silence(ws: &mut Ws) {
    let result = time::timeout(Duration::from_millis(200), next_event(ws)).await;
    if let Ok((name, data)) = result {
        panic!("expected no event, got {name}: {data}");
    }
}

pub fn room(content_id: &str, episode_id: &str) -> Value {
    serde_json::json!({ "contentId": content_id, "episodeId": episode_id })
}
