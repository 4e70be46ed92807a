//! End-to-end tests: a real server on a free port, real WebSocket peers.

use futures_util::{SinkExt, StreamExt};
use sharecode::config::Config;
use sharecode::models::{BootstrapResponse, CodeMessage};
use sharecode::{build_app, AppState};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a server on a free port, return its address and shared state.
async fn start_server(config: Config) -> (String, AppState) {
    let state = AppState::new(config);
    let app = build_app(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("127.0.0.1:{}", addr.port()), state)
}

fn quiet_join_config() -> Config {
    Config {
        replay_on_join: false,
        ..Config::default()
    }
}

async fn bootstrap(addr: &str) -> String {
    reqwest::get(format!("http://{}/", addr))
        .await
        .unwrap()
        .json::<BootstrapResponse>()
        .await
        .unwrap()
        .session_id
}

async fn open(addr: &str, session_id: &str) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/live/{}", addr, session_id)).await.unwrap();
    ws
}

async fn send_code(ws: &mut Ws, code: &str) {
    ws.send(Message::text(CodeMessage::new(code).encode())).await.unwrap();
}

async fn next_code(ws: &mut Ws) -> String {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str::<CodeMessage>(text.as_str()).unwrap().code;
        }
    }
}

async fn assert_silent(ws: &mut Ws) {
    let got = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(got.is_err(), "expected no frame, got {got:?}");
}

/// Poll until the session has `expected` peers.
async fn wait_for_peers(state: &AppState, session_id: &str, expected: usize) {
    for _ in 0..200 {
        if state.registry.peer_count(session_id).await.ok() == Some(expected) {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never reached {expected} peers");
}

#[tokio::test]
async fn bootstrap_twice_gives_distinct_sessions() {
    let (addr, _) = start_server(Config::default()).await;
    let a = bootstrap(&addr).await;
    let b = bootstrap(&addr).await;
    assert_ne!(a, b);
}

#[tokio::test]
async fn message_reaches_all_other_peers_but_not_sender() {
    let (addr, state) = start_server(quiet_join_config()).await;
    let session = bootstrap(&addr).await;

    let mut a = open(&addr, &session).await;
    let mut b = open(&addr, &session).await;
    let mut c = open(&addr, &session).await;
    wait_for_peers(&state, &session, 3).await;

    send_code(&mut a, "SELECT 1").await;

    assert_eq!(next_code(&mut b).await, "SELECT 1");
    assert_eq!(next_code(&mut c).await, "SELECT 1");
    assert_silent(&mut a).await;
    assert_eq!(state.registry.get_document(&session).await.unwrap(), "SELECT 1");
}

#[tokio::test]
async fn sessions_are_isolated() {
    let (addr, state) = start_server(quiet_join_config()).await;
    let first = bootstrap(&addr).await;
    let second = bootstrap(&addr).await;

    let mut a = open(&addr, &first).await;
    let mut other = open(&addr, &second).await;
    wait_for_peers(&state, &first, 1).await;
    wait_for_peers(&state, &second, 1).await;

    send_code(&mut a, "SELECT 1").await;
    assert_silent(&mut other).await;
    assert_eq!(state.registry.get_document(&second).await.unwrap(), "");
}

#[tokio::test]
async fn unknown_session_upgrade_is_rejected() {
    let (addr, state) = start_server(Config::default()).await;
    let result = connect_async(format!("ws://{}/live/does-not-exist", addr)).await;
    assert!(result.is_err(), "upgrade to an unknown session must fail");
    assert!(!state.registry.contains("does-not-exist").await);
}

#[tokio::test]
async fn malformed_payload_keeps_connection_and_document() {
    let (addr, state) = start_server(quiet_join_config()).await;
    let session = bootstrap(&addr).await;

    let mut a = open(&addr, &session).await;
    let mut b = open(&addr, &session).await;
    wait_for_peers(&state, &session, 2).await;

    send_code(&mut a, "SELECT 1").await;
    assert_eq!(next_code(&mut b).await, "SELECT 1");

    a.send(Message::text("{not json")).await.unwrap();
    a.send(Message::text(r#"{"cod":"typo"}"#)).await.unwrap();
    assert_silent(&mut b).await;
    assert_eq!(state.registry.get_document(&session).await.unwrap(), "SELECT 1");
    assert_eq!(state.registry.peer_count(&session).await.unwrap(), 2);

    // the sender is still attached and can keep editing
    send_code(&mut a, "SELECT 2").await;
    assert_eq!(next_code(&mut b).await, "SELECT 2");
}

#[tokio::test]
async fn closing_a_peer_shrinks_the_peer_set() {
    let (addr, state) = start_server(quiet_join_config()).await;
    let session = bootstrap(&addr).await;

    let mut a = open(&addr, &session).await;
    let b = open(&addr, &session).await;
    wait_for_peers(&state, &session, 2).await;

    a.close(None).await.unwrap();
    wait_for_peers(&state, &session, 1).await;

    // abrupt drop without a close frame gets the same cleanup
    drop(b);
    wait_for_peers(&state, &session, 0).await;
}

#[tokio::test]
async fn late_joiner_receives_current_document() {
    let config = Config {
        auto_create_sessions: true,
        ..Config::default()
    };
    let (addr, state) = start_server(config).await;

    let mut a = open(&addr, "abc123").await;
    // replay of the empty document marks A as attached
    assert_eq!(next_code(&mut a).await, "");
    send_code(&mut a, "SELECT 1").await;

    for _ in 0..200 {
        if state.registry.get_document("abc123").await.unwrap() == "SELECT 1" {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let mut b = open(&addr, "abc123").await;
    assert_eq!(next_code(&mut b).await, "SELECT 1");
}

#[tokio::test]
async fn late_joiner_sees_nothing_without_replay() {
    let (addr, state) = start_server(quiet_join_config()).await;
    let session = bootstrap(&addr).await;

    let mut a = open(&addr, &session).await;
    wait_for_peers(&state, &session, 1).await;
    send_code(&mut a, "SELECT 1").await;

    for _ in 0..200 {
        if state.registry.get_document(&session).await.unwrap() == "SELECT 1" {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let mut b = open(&addr, &session).await;
    wait_for_peers(&state, &session, 2).await;
    assert_silent(&mut b).await;
    assert_eq!(state.registry.get_document(&session).await.unwrap(), "SELECT 1");
}

#[tokio::test]
async fn later_writer_wins_and_both_updates_are_relayed() {
    let (addr, state) = start_server(quiet_join_config()).await;
    let session = bootstrap(&addr).await;

    let mut a = open(&addr, &session).await;
    let mut b = open(&addr, &session).await;
    let mut c = open(&addr, &session).await;
    wait_for_peers(&state, &session, 3).await;

    send_code(&mut a, "UPDATE t SET x=1").await;
    assert_eq!(next_code(&mut c).await, "UPDATE t SET x=1");
    sleep(Duration::from_millis(5)).await;
    send_code(&mut b, "DELETE FROM t").await;

    assert_eq!(next_code(&mut c).await, "DELETE FROM t");
    assert_eq!(next_code(&mut a).await, "DELETE FROM t");
    assert_eq!(next_code(&mut b).await, "UPDATE t SET x=1");

    assert_eq!(state.registry.get_document(&session).await.unwrap(), "DELETE FROM t");
}
