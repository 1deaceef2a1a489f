//! End-to-end relay tests over real WebSocket connections.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use taplink_protocol::KeyMaterial;
use taplink_server::net;
use taplink_server::session::SessionManager;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const KEY_NAMES: [&str; 6] = [
    "masterKey",
    "authKey",
    "readKey",
    "writeKey",
    "changeKey",
    "defaultKey",
];

async fn start_relay() -> String {
    let keys: HashMap<String, String> = KEY_NAMES
        .iter()
        .map(|name| (name.to_string(), "AA".repeat(16)))
        .collect();
    let (manager, sessions) = SessionManager::new(KeyMaterial::from_map(keys));
    tokio::spawn(manager.run());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(net::run(listener, "/reader".to_string(), sessions));

    format!("ws://{addr}")
}

async fn connect(url: &str, path: &str) -> WsClient {
    let (ws, _) = timeout(Duration::from_secs(5), connect_async(format!("{url}{path}")))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn send_text(ws: &mut WsClient, frame: &str) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("receive timed out")
            .expect("connection closed")
            .expect("receive failed");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Skip frames until one with the given `type` tag arrives, returning it
/// together with everything skipped on the way.
async fn next_of_type(ws: &mut WsClient, kind: &str) -> (Value, Vec<Value>) {
    let mut skipped = Vec::new();
    loop {
        let frame = next_json(ws).await;
        if frame["type"] == kind {
            return (frame, skipped);
        }
        skipped.push(frame);
    }
}

/// Wait for a `status_update` matching `predicate`, collecting the ones
/// seen before it.
async fn next_status(ws: &mut WsClient, predicate: impl Fn(&Value) -> bool) -> Vec<Value> {
    let mut seen = Vec::new();
    loop {
        let (frame, _) = next_of_type(ws, "status_update").await;
        if predicate(&frame["data"]) {
            return seen;
        }
        seen.push(frame);
    }
}

#[tokio::test]
async fn test_ui_initial_sync_is_snapshot_then_history() {
    let url = start_relay().await;
    let mut ui = connect(&url, "/").await;

    let first = next_json(&mut ui).await;
    assert_eq!(first["type"], "status_update");
    assert_eq!(first["data"]["readerStatus"], "WAITING_FOR_READER");
    assert_eq!(first["data"]["readerConnected"], false);

    let second = next_json(&mut ui).await;
    assert_eq!(second["type"], "log_history");
    let history = second["data"].as_array().unwrap();
    assert!(history[0].as_str().unwrap().contains("Server started"));
}

#[tokio::test]
async fn test_card_and_command_round_trip() {
    let url = start_relay().await;

    let mut ui = connect(&url, "/").await;
    next_of_type(&mut ui, "log_history").await;

    let mut reader = connect(&url, "/reader").await;
    next_status(&mut ui, |d| d["readerConnected"] == true).await;

    // Card arrives.
    send_text(&mut reader, r#"{"type":"status","payload":{"uid":"04A1B2"}}"#).await;
    let (frame, _) = next_of_type(&mut ui, "status_update").await;
    assert_eq!(frame["data"]["readerStatus"], "CARD_PRESENT");
    assert_eq!(frame["data"]["currentCardUid"], "04A1B2");
    assert!(frame["data"]["lastSeen"].is_i64());

    // UI asks for an authentication run.
    send_text(&mut ui, r#"{"type":"command","command":"authenticate"}"#).await;

    let command = next_json(&mut reader).await;
    assert_eq!(command["type"], "command");
    assert_eq!(command["payload"]["command"], "authenticate");
    assert_eq!(command["payload"]["uid"], "04A1B2");
    assert_eq!(command["payload"]["keyNo"], 1);
    assert_eq!(command["payload"]["authKey"].as_array().unwrap().len(), 16);
    assert_eq!(command["payload"]["authKey"][0], 170);
    assert!(command["payload"].get("keys").is_none());

    let (sent, _) = next_of_type(&mut ui, "command_sent").await;
    assert_eq!(sent["data"]["command"], "authenticate");

    send_text(
        &mut reader,
        r#"{"type":"command_result","payload":{"uid":"04A1B2","success":true,"message":"auth ok","logs":["sector 1 ok"]}}"#,
    )
    .await;

    let (result, skipped) = next_of_type(&mut ui, "command_result").await;
    assert_eq!(result["data"]["success"], true);
    assert_eq!(result["data"]["uid"], "04A1B2");
    assert_eq!(result["data"]["message"], "auth ok");
    assert!(skipped.iter().any(|f| {
        f["type"] == "log" && f["data"].as_str().unwrap().contains("[Reader] sector 1 ok")
    }));
}

#[tokio::test]
async fn test_newer_reader_evicts_older_without_reset() {
    let url = start_relay().await;

    let mut ui = connect(&url, "/").await;
    next_of_type(&mut ui, "log_history").await;

    let reader_a = connect(&url, "/reader").await;
    next_status(&mut ui, |d| d["readerConnected"] == true).await;

    let mut reader_b = connect(&url, "/reader").await;
    next_status(&mut ui, |d| d["readerConnected"] == true).await;

    // Old connection's socket is torn down server-side; dropping our end
    // too must not disturb state owned by the new connection.
    drop(reader_a);

    send_text(&mut reader_b, r#"{"type":"status","payload":{"uid":"C0FFEE"}}"#).await;
    let earlier = next_status(&mut ui, |d| d["readerStatus"] == "CARD_PRESENT").await;
    for frame in earlier {
        assert_ne!(frame["data"]["readerStatus"], "WAITING_FOR_READER");
    }
}

#[tokio::test]
async fn test_command_error_reaches_issuer_only() {
    let url = start_relay().await;

    let mut issuer = connect(&url, "/").await;
    next_of_type(&mut issuer, "log_history").await;
    let mut bystander = connect(&url, "/").await;
    next_of_type(&mut bystander, "log_history").await;

    // No reader connected: validation fails at the first precondition.
    send_text(&mut issuer, r#"{"type":"command","command":"enroll"}"#).await;
    let (error, skipped) = next_of_type(&mut issuer, "command_error").await;
    assert_eq!(error["data"]["message"], "Reader not connected.");
    assert!(skipped.iter().any(|f| {
        f["type"] == "log" && f["data"].as_str().unwrap().contains("[Server] Error:")
    }));

    // A later broadcast bounds what the bystander could have received by
    // now; nothing before it may mention the failed attempt.
    let _reader = connect(&url, "/reader").await;
    let mut seen = Vec::new();
    loop {
        let frame = next_json(&mut bystander).await;
        let done = frame["type"] == "status_update" && frame["data"]["readerConnected"] == true;
        seen.push(frame);
        if done {
            break;
        }
    }
    for frame in seen {
        assert_ne!(frame["type"], "command_error");
        if frame["type"] == "log" {
            assert!(!frame["data"].as_str().unwrap().contains("Error"));
        }
    }
}
