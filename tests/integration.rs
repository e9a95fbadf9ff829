//! End-to-end tests against a real server over WebSocket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use chartcast::{ChartType, Server, ServerConfig, ServerHandle, StreamKey};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn test_config() -> ServerConfig {
    ServerConfig::default()
        .port(0)
        .shutdown_timeout(Duration::from_millis(500))
}

fn boot_server() -> ServerHandle {
    ServerHandle::start(test_config()).unwrap()
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn subscribe(url: &str, chart_type: &str, key_word: &str) -> WsStream {
    let mut ws = connect(url).await;
    send_json(&mut ws, json!({"chart_type": chart_type, "key_word": key_word})).await;
    ws
}

/// Next text frame as JSON, skipping control frames
async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Wait for the server's close frame
async fn expect_close(ws: &mut WsStream) -> CloseFrame {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended without close frame")
            .expect("read failed");
        match msg {
            Message::Close(Some(frame)) => return frame,
            Message::Close(None) => panic!("close frame without code"),
            _ => continue,
        }
    }
}

async fn expect_success(ws: &mut WsStream) {
    assert_eq!(
        next_json(ws).await,
        json!({"status": "success", "message": "Subscription successful."})
    );
}

fn sample(value: f64) -> Value {
    json!({"id": "1", "timestamp": "2024-01-01T00:00:00", "value": value})
}

#[tokio::test]
async fn test_subscribe_receives_cached_then_live() {
    let server = boot_server();
    let key = StreamKey::new("line", "demo");
    server.register(&key);
    server.push_sync(&key, sample(42.0));

    let mut ws = subscribe(&server.url(), "line", "demo").await;
    expect_success(&mut ws).await;
    assert_eq!(next_json(&mut ws).await, sample(42.0));

    server.push_sync(&key, sample(43.0));
    assert_eq!(next_json(&mut ws).await, sample(43.0));
}

#[tokio::test]
async fn test_keyword_is_normalized() {
    let server = boot_server();
    let line = server.stream(ChartType::Line, "Demo");

    let mut ws = subscribe(&server.url(), "line", "  DEMO ").await;
    expect_success(&mut ws).await;

    assert!(line.update(sample(1.0)));
    assert_eq!(next_json(&mut ws).await, sample(1.0));
}

#[tokio::test]
async fn test_replay_disabled_waits_for_next_push() {
    let server = ServerHandle::start(test_config().disable_replay()).unwrap();
    let key = StreamKey::new("line", "demo");
    server.register(&key);
    server.push_sync(&key, sample(1.0));

    let mut ws = subscribe(&server.url(), "line", "demo").await;
    expect_success(&mut ws).await;

    server.push_sync(&key, sample(2.0));
    assert_eq!(next_json(&mut ws).await, sample(2.0));
}

#[tokio::test]
async fn test_unknown_key_is_rejected() {
    let server = boot_server();

    let mut ws = subscribe(&server.url(), "pie", "unknown").await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"status": "failure", "message": "Invalid chart type or keyword."})
    );
    assert_eq!(u16::from(expect_close(&mut ws).await.code), 1008);

    let key = StreamKey::new("pie", "unknown");
    assert!(server.get_cache(&key).is_none());
    assert!(!server.registry().is_registered(&key));
}

#[tokio::test]
async fn test_malformed_request_is_rejected() {
    let server = boot_server();
    server.register(&StreamKey::new("line", "demo"));

    for request in [
        "not json",
        r#"{"chart_type":"line"}"#,
        r#"{"key_word":"demo"}"#,
        r#"["line","demo"]"#,
    ] {
        let mut ws = connect(&server.url()).await;
        ws.send(Message::Text(request.into())).await.unwrap();

        assert_eq!(next_json(&mut ws).await["status"], "failure");
        assert_eq!(u16::from(expect_close(&mut ws).await.code), 1008);
    }
}

#[tokio::test]
async fn test_wrong_path_is_rejected() {
    let server = boot_server();
    let url = format!("ws://127.0.0.1:{}/other", server.local_addr().port());

    let mut ws = connect(&url).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"status": "failure", "message": "Connection attempt on invalid path."})
    );
    assert_eq!(u16::from(expect_close(&mut ws).await.code), 1008);
}

#[tokio::test]
async fn test_query_suffix_is_rejected() {
    let server = boot_server();
    server.register(&StreamKey::new("line", "demo"));
    let url = format!("{}?foo=bar", server.url());

    let mut ws = connect(&url).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"status": "failure", "message": "Connection attempt on invalid path."})
    );
    assert_eq!(u16::from(expect_close(&mut ws).await.code), 1008);
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let config = test_config().handshake_timeout(Duration::from_millis(100));
    let server = ServerHandle::start(config).unwrap();
    server.register(&StreamKey::new("line", "demo"));

    let mut ws = connect(&server.url()).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"status": "failure", "message": "Invalid chart type or keyword."})
    );
    assert_eq!(u16::from(expect_close(&mut ws).await.code), 1008);
}

#[tokio::test]
async fn test_empty_route_accepts_any_path() {
    let server = ServerHandle::start(test_config().route("")).unwrap();
    server.register(&StreamKey::new("text", "log"));
    let url = format!("ws://127.0.0.1:{}/anything", server.local_addr().port());

    let mut ws = subscribe(&url, "text", "log").await;
    expect_success(&mut ws).await;
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let server = boot_server();
    let key_a = StreamKey::new("line", "a");
    let key_b = StreamKey::new("line", "b");
    server.register(&key_a);
    server.register(&key_b);

    let mut ws_a = subscribe(&server.url(), "line", "a").await;
    expect_success(&mut ws_a).await;
    let mut ws_b = subscribe(&server.url(), "line", "b").await;
    expect_success(&mut ws_b).await;

    // Updates are dispatched in push order, so a leaked frame would arrive first
    server.push_sync(&key_a, sample(1.0));
    server.push_sync(&key_b, sample(2.0));
    server.push_sync(&key_a, sample(3.0));

    assert_eq!(next_json(&mut ws_a).await, sample(1.0));
    assert_eq!(next_json(&mut ws_a).await, sample(3.0));
    assert_eq!(next_json(&mut ws_b).await, sample(2.0));

    server.push_sync(&key_b, sample(4.0));
    assert_eq!(next_json(&mut ws_b).await, sample(4.0));
}

#[tokio::test]
async fn test_fanout_survives_dropped_subscriber() {
    let server = boot_server();
    let key = StreamKey::new("bar", "shared");
    server.register(&key);

    let mut clients = Vec::new();
    for _ in 0..4 {
        let mut ws = subscribe(&server.url(), "bar", "shared").await;
        expect_success(&mut ws).await;
        clients.push(ws);
    }

    server.push_sync(&key, sample(1.0));
    for ws in clients.iter_mut() {
        assert_eq!(next_json(ws).await, sample(1.0));
    }

    // One client goes away without a close handshake
    drop(clients.remove(0));

    server.push_sync(&key, sample(2.0));
    for ws in clients.iter_mut() {
        assert_eq!(next_json(ws).await, sample(2.0));
    }
}

#[tokio::test]
async fn test_stalled_subscriber_is_dropped() {
    let config = test_config()
        .subscriber_queue_capacity(2)
        .send_timeout(Duration::from_millis(200));
    let server = ServerHandle::start(config).unwrap();
    let key = StreamKey::new("text", "bulk");
    server.register(&key);

    let mut stalled = subscribe(&server.url(), "text", "bulk").await;
    expect_success(&mut stalled).await;
    let mut reader = subscribe(&server.url(), "text", "bulk").await;
    expect_success(&mut reader).await;

    // Far more than the socket buffers of a client that never reads can hold
    const UPDATES: usize = 512;
    let chunk = "x".repeat(64 * 1024);
    for i in 0..UPDATES {
        let payload = json!({"id": i.to_string(), "timestamp": "2024-01-01T00:00:00", "value": chunk});
        server.push_sync(&key, payload);
        assert_eq!(next_json(&mut reader).await["id"], json!(i.to_string()));
    }

    // The stalled client finds only what was buffered before the server gave up on it
    let mut received = 0;
    let ended = loop {
        match timeout(TIMEOUT, stalled.next()).await {
            Ok(Some(Ok(Message::Text(_)))) => received += 1,
            Ok(Some(Ok(Message::Close(frame)))) => {
                if let Some(frame) = frame {
                    assert_eq!(u16::from(frame.code), 1013);
                }
                break true;
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) | Ok(None) => break true,
            Err(_) => break false,
        }
    };
    assert!(ended, "stalled subscriber was never disconnected");
    assert!(received < UPDATES);
}

#[tokio::test]
async fn test_updates_arrive_in_order() {
    let server = boot_server();
    let key = StreamKey::new("line", "ordered");
    server.register(&key);

    let mut ws = subscribe(&server.url(), "line", "ordered").await;
    expect_success(&mut ws).await;

    for i in 0..50 {
        server.push_sync(&key, sample(i as f64));
    }
    for i in 0..50 {
        assert_eq!(next_json(&mut ws).await["value"], json!(i as f64));
    }
}

#[tokio::test]
async fn test_stop_closes_subscribers() {
    let server = boot_server();
    server.register(&StreamKey::new("line", "demo"));

    let mut ws = subscribe(&server.url(), "line", "demo").await;
    expect_success(&mut ws).await;

    let stopper = tokio::task::spawn_blocking(move || {
        server.stop();
        server
    });

    let frame = expect_close(&mut ws).await;
    assert_eq!(u16::from(frame.code), 1000);

    let server = stopper.await.unwrap();
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_restart_clears_registry() {
    let server = Server::new();
    let handle = server.start(test_config()).unwrap();
    handle.stream(ChartType::Line, "demo");
    drop(handle);

    let handle = tokio::task::spawn_blocking(move || {
        let handle = server.restart(test_config());
        (server, handle)
    });
    let (server, handle) = handle.await.unwrap();
    let handle = handle.unwrap();
    assert!(!handle.registry().is_registered(&StreamKey::new("line", "demo")));

    let mut ws = subscribe(&handle.url(), "line", "demo").await;
    assert_eq!(next_json(&mut ws).await["status"], "failure");
    drop(ws);

    tokio::task::spawn_blocking(move || server.stop()).await.unwrap();
}
