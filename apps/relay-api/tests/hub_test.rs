mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use relay_api::builds::BuildRecord;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(
    addr: SocketAddr,
    role: &str,
    room: &str,
) -> Result<WsStream, tungstenite::Error> {
    let url = format!("ws://{addr}/ws?role={role}&room={room}");
    tokio_tungstenite::connect_async(&url)
        .await
        .map(|(stream, _)| stream)
}

/// Read the next text frame as JSON, with a timeout.
async fn next_json(ws: &mut WsStream) -> serde_json::Value {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout waiting for frame")
        .expect("stream ended")
        .expect("ws read error");
    let text = msg.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse frame")
}

async fn send_json(ws: &mut WsStream, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

/// Wait until the room's poll timer reaches the expected state.
async fn wait_for_polling(state: &relay_api::AppState, room: &str, expected: bool) {
    let room = state.rooms.get_or_create(room);
    for _ in 0..100 {
        if room.is_polling() == expected {
            return;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    panic!("poll timer never became {expected}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn message_broadcasts_to_both_peers() {
    let (addr, _state) = common::start_server(Arc::new(common::ScriptedFetcher::unreachable())).await;

    let mut first = connect(addr, "peer", "chat").await.expect("connect first");
    let mut second = connect(addr, "peer", "chat").await.expect("connect second");

    // Give the second admission time to land before broadcasting.
    time::sleep(Duration::from_millis(50)).await;

    send_json(&mut first, serde_json::json!({"type": "message", "data": "hi"})).await;

    for ws in [&mut first, &mut second] {
        let frame = next_json(ws).await;
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["name"], "Anonymous");
        assert_eq!(frame["data"], "hi");
    }
}

#[tokio::test]
async fn unrecognized_role_is_rejected_with_400() {
    let (addr, state) = common::start_server(Arc::new(common::ScriptedFetcher::unreachable())).await;

    for role in ["plugin", "unknown", "SUBSCRIBER", ""] {
        let err = connect(addr, role, "strict").await.expect_err("must reject");
        match err {
            tungstenite::Error::Http(response) => {
                assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    // Missing role entirely.
    let url = format!("ws://{addr}/ws");
    let err = tokio_tungstenite::connect_async(&url)
        .await
        .expect_err("must reject");
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
        }
        other => panic!("expected http error, got {other:?}"),
    }

    assert_eq!(state.rooms.get_or_create("strict").connection_count(), 0);
}

#[tokio::test]
async fn first_subscriber_receives_latest_build() {
    let fetcher = common::ScriptedFetcher::new(vec![Ok(BuildRecord::observed_now("abc", "42"))]);
    let (addr, state) = common::start_server(Arc::new(fetcher)).await;

    let mut ws = connect(addr, "subscriber", "watch").await.expect("connect");

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "build");
    assert_eq!(frame["data"]["hash"], "abc");
    assert_eq!(frame["data"]["id"], "42");
    assert_eq!(frame["data"]["type"], "READY");

    let history = state.store.get_all().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].hash, "abc");

    wait_for_polling(&state, "watch", true).await;
}

#[tokio::test]
async fn timer_goes_idle_when_last_subscriber_disconnects() {
    let fetcher = common::ScriptedFetcher::new(vec![Ok(BuildRecord::observed_now("abc", "42"))]);
    let (addr, state) = common::start_server(Arc::new(fetcher)).await;

    let _peer = connect(addr, "peer", "mixed").await.expect("connect peer");
    let mut subscriber = connect(addr, "subscriber", "mixed")
        .await
        .expect("connect subscriber");

    // Drain the admission build event, then confirm the timer is up.
    let frame = next_json(&mut subscriber).await;
    assert_eq!(frame["type"], "build");
    wait_for_polling(&state, "mixed", true).await;

    subscriber.close(None).await.expect("close");

    // Peer connections remain, but the timer must stop.
    wait_for_polling(&state, "mixed", false).await;
    let room = state.rooms.get_or_create("mixed");
    assert_eq!(room.connection_count(), 1);
}

#[tokio::test]
async fn rename_pushes_roster_to_everyone() {
    let (addr, _state) = common::start_server(Arc::new(common::ScriptedFetcher::unreachable())).await;

    let mut first = connect(addr, "peer", "roster").await.expect("connect first");
    let mut second = connect(addr, "peer", "roster").await.expect("connect second");
    time::sleep(Duration::from_millis(50)).await;

    send_json(
        &mut first,
        serde_json::json!({"type": "change_name", "data": "ada"}),
    )
    .await;

    for ws in [&mut first, &mut second] {
        let frame = next_json(ws).await;
        assert_eq!(frame["type"], "list");
        assert_eq!(frame["data"], serde_json::json!(["ada", "Anonymous"]));
    }

    // Messages now carry the chosen name.
    send_json(&mut first, serde_json::json!({"type": "message", "data": "hi"})).await;
    let frame = next_json(&mut second).await;
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["name"], "ada");
}

#[tokio::test]
async fn malformed_frames_do_not_disturb_the_room() {
    let (addr, _state) = common::start_server(Arc::new(common::ScriptedFetcher::unreachable())).await;

    let mut first = connect(addr, "peer", "noise").await.expect("connect first");
    let mut second = connect(addr, "peer", "noise").await.expect("connect second");
    time::sleep(Duration::from_millis(50)).await;

    send_json(&mut first, serde_json::json!({"type": "presence", "data": "x"})).await;
    first
        .send(tungstenite::Message::Text("not json".to_string().into()))
        .await
        .expect("send garbage");

    // Both connections still live; a valid frame still broadcasts.
    send_json(&mut first, serde_json::json!({"type": "message", "data": "still here"})).await;
    let frame = next_json(&mut second).await;
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["data"], "still here");
}

#[tokio::test]
async fn rooms_are_isolated() {
    let (addr, _state) = common::start_server(Arc::new(common::ScriptedFetcher::unreachable())).await;

    let mut left = connect(addr, "peer", "left").await.expect("connect left");
    let mut right = connect(addr, "peer", "right").await.expect("connect right");
    time::sleep(Duration::from_millis(50)).await;

    send_json(&mut left, serde_json::json!({"type": "message", "data": "left only"})).await;

    // The sender echoes back; the other room hears nothing.
    let frame = next_json(&mut left).await;
    assert_eq!(frame["data"], "left only");

    let silence = time::timeout(Duration::from_millis(200), right.next()).await;
    assert!(silence.is_err(), "other room must not receive the message");
}

#[tokio::test]
async fn build_history_is_served_over_http() {
    let (addr, state) = common::start_server(Arc::new(common::ScriptedFetcher::unreachable())).await;
    let client = reqwest::Client::new();

    // Empty history: list is empty, latest is 404.
    let resp = client
        .get(format!("http://{addr}/api/v1/builds"))
        .send()
        .await
        .expect("list request");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.expect("parse list");
    assert_eq!(body, serde_json::json!([]));

    let resp = client
        .get(format!("http://{addr}/api/v1/builds/latest"))
        .send()
        .await
        .expect("latest request");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    // Seed two records and read them back newest-first.
    state
        .store
        .append_if_absent(BuildRecord::observed_now("first", "1"))
        .await
        .unwrap();
    state
        .store
        .append_if_absent(BuildRecord::observed_now("second", "2"))
        .await
        .unwrap();

    let resp = client
        .get(format!("http://{addr}/api/v1/builds"))
        .send()
        .await
        .expect("list request");
    let body: serde_json::Value = resp.json().await.expect("parse list");
    assert_eq!(body[0]["hash"], "second");
    assert_eq!(body[1]["hash"], "first");

    let resp = client
        .get(format!("http://{addr}/api/v1/builds/latest"))
        .send()
        .await
        .expect("latest request");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.expect("parse latest");
    assert_eq!(body["hash"], "second");
}
