//! End-to-end relay tests against a server bound to an ephemeral port.

use futures_util::{SinkExt, StreamExt};
use inkroom_core::render::DisplayList;
use inkroom_core::storage::{EventStore, MemoryEventStore, open_storage};
use inkroom_core::{ClientSession, NativeWebSocket, PointerEvent, Viewport};
use inkroom_server::config::ChannelSet;
use inkroom_server::router;
use inkroom_server::state::{AppState, SharedState};
use kurbo::Point;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    state: SharedState,
}

impl TestServer {
    async fn start(state: AppState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(state);
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    async fn with_store(store: Arc<dyn EventStore>) -> Self {
        Self::start(AppState::new(store, ChannelSet::default(), "boards".to_string())).await
    }

    async fn memory() -> Self {
        Self::with_store(Arc::new(MemoryEventStore::new())).await
    }

    fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Connect to a room and wait until the relay has registered the peer.
    async fn join(&self, room: &str) -> Client {
        let before = self.state.room(room).peer_count().await;
        let (ws, _) = connect_async(self.url(&format!("/ws/{room}"))).await.unwrap();
        self.wait_for_peers(room, before + 1).await;
        ws
    }

    async fn wait_for_peers(&self, room: &str, count: usize) {
        for _ in 0..200 {
            if self.state.room(room).peer_count().await >= count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("room {room} never reached {count} peers");
    }

    async fn wait_for_empty(&self, room: &str) {
        for _ in 0..200 {
            if self.state.room(room).peer_count().await == 0 {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("room {room} never emptied");
    }

    async fn wait_for_history(&self, room: &str, count: usize) {
        for _ in 0..200 {
            if self.state.room(room).history_len().await >= count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("room {room} never reached {count} events");
    }
}

fn pen(x: f64) -> Value {
    json!({"event": "pen", "data": {"x0": x, "y0": 0.1, "x1": x, "y1": 0.2, "color": "red"}})
}

async fn send(ws: &mut Client, frame: &Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn recv(ws: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(ws: &mut Client) {
    assert!(
        timeout(Duration::from_millis(200), ws.next()).await.is_err(),
        "unexpected frame"
    );
}

/// Read until the relay closes the socket; returns how many text frames came first.
async fn wait_for_close(ws: &mut Client) -> usize {
    let mut frames = 0;
    loop {
        let msg = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("socket stayed open");
        match msg {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return frames,
            Some(Ok(Message::Text(_))) => frames += 1,
            Some(Ok(_)) => {}
        }
    }
}

async fn wait_for_stored(store: &dyn EventStore, room: &str, count: usize) -> Vec<inkroom_core::WireEvent> {
    for _ in 0..200 {
        let events = store.load(room).await.unwrap();
        if events.len() >= count {
            return events;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("storage never reached {count} events");
}

#[tokio::test]
async fn test_late_joiner_replays_history_before_live_events() {
    let server = TestServer::memory().await;
    let mut alice = server.join("art").await;

    for x in [0.1, 0.2, 0.3] {
        send(&mut alice, &pen(x)).await;
    }
    server.wait_for_history("art", 3).await;

    let mut bob = server.join("art").await;
    send(&mut alice, &pen(0.4)).await;

    let mut seen = Vec::new();
    for _ in 0..4 {
        let frame = recv(&mut bob).await;
        assert_eq!(frame["event"], json!("pen"));
        assert!(frame["data"]["timestamp"].is_i64());
        seen.push(frame["data"]["x0"].as_f64().unwrap());
    }
    assert_eq!(seen, vec![0.1, 0.2, 0.3, 0.4]);
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_sender_is_not_echoed() {
    let server = TestServer::memory().await;
    let mut alice = server.join("art").await;
    let mut bob = server.join("art").await;

    send(&mut alice, &pen(0.5)).await;
    assert_eq!(recv(&mut bob).await["data"]["x0"], json!(0.5));
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_relay_overwrites_timestamps() {
    let server = TestServer::memory().await;
    let mut alice = server.join("art").await;
    let mut bob = server.join("art").await;

    let before = inkroom_server::room::now_millis();
    send(
        &mut alice,
        &json!({"event": "story", "data": {"x": 0.4, "y": 0.3, "color": "black", "timestamp": 1}}),
    )
    .await;

    let frame = recv(&mut bob).await;
    let stamp = frame["data"]["timestamp"].as_i64().unwrap();
    assert!(stamp >= before);

    // date strings from older clients are accepted and replaced too
    send(
        &mut alice,
        &json!({"event": "pen", "data": {"x0": 0.1, "y0": 0.1, "x1": 0.2, "y1": 0.2, "color": "red", "timestamp": "2017-05-01T10:00:00.000Z"}}),
    )
    .await;
    let frame = recv(&mut bob).await;
    assert_eq!(frame["event"], json!("pen"));
    assert!(frame["data"]["timestamp"].as_i64().unwrap() >= stamp);
    assert_eq!(server.state.room("art").history_len().await, 2);
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let server = TestServer::memory().await;
    let mut alice = server.join("art").await;
    let mut bob = server.join("art").await;

    alice.send(Message::text("not json")).await.unwrap();
    send(&mut alice, &json!({"event": "chat", "data": {"text": "hi"}})).await;
    send(&mut alice, &json!({"event": "pen", "data": {"x0": "left"}})).await;
    send(&mut alice, &json!({"no": "envelope"})).await;
    send(&mut alice, &pen(0.7)).await;

    assert_eq!(recv(&mut bob).await["data"]["x0"], json!(0.7));
    assert_silent(&mut bob).await;
    assert_eq!(server.state.room("art").history_len().await, 1);

    // connection still usable after garbage
    send(&mut alice, &pen(0.8)).await;
    assert_eq!(recv(&mut bob).await["data"]["x0"], json!(0.8));
}

#[tokio::test]
async fn test_unknown_fields_survive_relay_and_storage() {
    let store = Arc::new(MemoryEventStore::new());
    let server = TestServer::with_store(store.clone()).await;
    let mut alice = server.join("art").await;
    let mut bob = server.join("art").await;

    send(
        &mut alice,
        &json!({"event": "pen", "data": {"x0": 0.1, "y0": 0.1, "x1": 0.2, "y1": 0.2, "color": "red", "brush": "chalk", "layer": 3}}),
    )
    .await;

    let frame = recv(&mut bob).await;
    assert_eq!(frame["data"]["brush"], json!("chalk"));
    assert_eq!(frame["data"]["layer"], json!(3));

    let stored = wait_for_stored(store.as_ref(), "art", 1).await;
    let stored: Value = serde_json::from_str(&stored[0].to_json().unwrap()).unwrap();
    assert_eq!(stored, frame);
}

#[tokio::test]
async fn test_two_senders_reach_third_in_receipt_order() {
    let server = TestServer::memory().await;
    let mut alice = server.join("art").await;
    let mut bob = server.join("art").await;
    let mut carol = server.join("art").await;

    send(&mut alice, &pen(0.1)).await;
    server.wait_for_history("art", 1).await;
    send(&mut bob, &pen(0.2)).await;
    server.wait_for_history("art", 2).await;
    send(&mut alice, &pen(0.3)).await;

    let mut last_stamp = 0;
    for expected in [0.1, 0.2, 0.3] {
        let frame = recv(&mut carol).await;
        assert_eq!(frame["data"]["x0"].as_f64(), Some(expected));
        let stamp = frame["data"]["timestamp"].as_i64().unwrap();
        assert!(stamp >= last_stamp);
        last_stamp = stamp;
    }
}

#[tokio::test]
async fn test_rooms_are_isolated_and_default_room_is_used() {
    let server = TestServer::memory().await;
    let mut in_art = server.join("art").await;

    let (mut lobby, _) = connect_async(server.url("/ws")).await.unwrap();
    server.wait_for_peers("boards", 1).await;
    send(&mut lobby, &pen(0.9)).await;

    server.wait_for_history("boards", 1).await;
    assert_silent(&mut in_art).await;
    assert_eq!(server.state.room("art").history_len().await, 0);
}

#[tokio::test]
async fn test_disabled_channels_are_dropped() {
    let server = TestServer::start(AppState::new(
        Arc::new(MemoryEventStore::new()),
        ChannelSet::parse("pen,story").unwrap(),
        "boards".to_string(),
    ))
    .await;
    let mut alice = server.join("art").await;
    let mut bob = server.join("art").await;

    send(&mut alice, &json!({"event": "update", "data": {"shapes": []}})).await;
    send(&mut alice, &pen(0.2)).await;

    assert_eq!(recv(&mut bob).await["event"], json!("pen"));
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_history_survives_restart_with_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().display());

    {
        let store = open_storage(&url).unwrap();
        let server = TestServer::with_store(store.clone()).await;
        let mut alice = server.join("art").await;
        send(&mut alice, &pen(0.1)).await;
        send(&mut alice, &pen(0.2)).await;
        wait_for_stored(store.as_ref(), "art", 2).await;
    }

    let server = TestServer::with_store(open_storage(&url).unwrap()).await;
    let mut bob = server.join("art").await;
    assert_eq!(recv(&mut bob).await["data"]["x0"], json!(0.1));
    assert_eq!(recv(&mut bob).await["data"]["x0"], json!(0.2));
}

#[tokio::test]
async fn test_lagging_peer_is_disconnected() {
    let server = TestServer::start(
        AppState::new(
            Arc::new(MemoryEventStore::new()),
            ChannelSet::default(),
            "boards".to_string(),
        )
        .with_channel_capacity(4),
    )
    .await;
    let mut bob = server.join("art").await;

    // published without yielding, so bob's connection cannot keep up
    let room = server.state.room("art");
    for i in 0..40 {
        let event = inkroom_core::WireEvent::from_parts(
            "pen",
            json!({"x0": i as f64 / 40.0, "y0": 0.1, "x1": 0.2, "y1": 0.2}),
        )
        .unwrap();
        room.publish("relay-test", event).await.unwrap();
    }

    assert!(wait_for_close(&mut bob).await < 40);
    server.wait_for_empty("art").await;

    // a fresh connection replays everything that was missed
    let mut again = server.join("art").await;
    let first = recv(&mut again).await;
    assert_eq!(first["data"]["x0"], json!(0.0));
    for _ in 1..40 {
        recv(&mut again).await;
    }
    assert_silent(&mut again).await;
}

#[tokio::test]
async fn test_rejoin_after_everyone_left_replays_from_storage() {
    let store = Arc::new(MemoryEventStore::new());
    let server = TestServer::with_store(store.clone()).await;

    let mut alice = server.join("art").await;
    send(&mut alice, &pen(0.1)).await;
    send(&mut alice, &pen(0.2)).await;
    server.wait_for_history("art", 2).await;
    alice.close(None).await.unwrap();
    server.wait_for_empty("art").await;
    assert_eq!(server.state.room("art").history_len().await, 0);

    let mut bob = server.join("art").await;
    assert_eq!(recv(&mut bob).await["data"]["x0"], json!(0.1));
    assert_eq!(recv(&mut bob).await["data"]["x0"], json!(0.2));
    assert_silent(&mut bob).await;
    assert_eq!(store.load("art").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::memory().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_native_sessions_share_a_board() {
    let server = TestServer::memory().await;
    let url = server.url("/ws/native");

    let mut alice_ws = NativeWebSocket::new();
    alice_ws.connect(&url).unwrap();
    let mut alice = ClientSession::new(alice_ws, Viewport::new(400.0, 200.0));

    let mut bob_ws = NativeWebSocket::new();
    bob_ws.connect(&url).unwrap();
    let mut bob = ClientSession::new(bob_ws, Viewport::new(800.0, 400.0));

    server.wait_for_peers("native", 2).await;

    let mut list = DisplayList::new();
    alice.set_color("red");
    let now = Instant::now();
    alice.handle_pointer(PointerEvent::Down { position: Point::new(40.0, 20.0) }, now);
    alice.handle_pointer(PointerEvent::Up { position: Point::new(80.0, 40.0) }, now);
    alice.tick(&mut list);

    for _ in 0..300 {
        bob.tick(&mut list);
        if !bob.canvas().is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(bob.canvas().len(), 1);
    let stroke = &bob.canvas().shapes()[0];
    assert!((stroke.origin().x - 80.0).abs() < 1e-9);
    assert!((stroke.origin().y - 40.0).abs() < 1e-9);
    assert!((stroke.endpoint().x - 160.0).abs() < 1e-9);
    assert!((stroke.endpoint().y - 80.0).abs() < 1e-9);
    assert_eq!(stroke.color(), "red");
    assert!(stroke.timestamp().is_some());
    assert_eq!(alice.canvas().len(), 1);
}
