//! Integration tests: start the bot on a free port, GET /, assert status JSON.
//! Uses mock session gateways. Server tasks are left running when a test ends.

use futures_util::{SinkExt, StreamExt};
use lib::config::Config;
use lib::runtime;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn temp_config_dir() -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("warelay-status-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create config dir");
    let config_path = dir.join("config.json");
    std::fs::File::create(&config_path)
        .and_then(|mut f| f.write_all(b"{}"))
        .expect("write config.json");
    (dir, config_path)
}

/// Accept one connection and hold it open without sending any events.
async fn spawn_silent_gateway() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ws listener");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("ws accept");
        while let Some(Ok(_)) = ws.next().await {}
    });
    format!("ws://{}", addr)
}

/// Accept one connection, push a pairing event, then wait for the signal to
/// push a disconnected event. The socket stays open throughout.
async fn spawn_pairing_gateway(disconnect: oneshot::Receiver<()>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ws listener");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("ws accept");

        let pairing = json!({
            "type": "event",
            "event": "session.pairing",
            "payload": { "code": "2@pair-code" }
        });
        ws.send(Message::Text(pairing.to_string())).await.expect("send pairing");

        let _ = disconnect.await;
        let disconnected = json!({
            "type": "event",
            "event": "session.disconnected",
            "payload": { "reason": "logged out" }
        });
        ws.send(Message::Text(disconnected.to_string()))
            .await
            .expect("send disconnected");
        while let Some(Ok(_)) = ws.next().await {}
    });
    format!("ws://{}", addr)
}

/// Poll GET `url` until the status JSON reports the given session phase.
async fn poll_session_phase(client: &reqwest::Client, url: &str, phase: &str) -> serde_json::Value {
    for _ in 0..100 {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                let status: serde_json::Value = resp.json().await.expect("parse status");
                if status.get("session").and_then(|v| v.as_str()) == Some(phase) {
                    return status;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("GET {} did not report session phase {:?} within 5s", url, phase);
}

#[tokio::test]
async fn status_endpoint_responds_with_running() {
    let port = free_port();
    let (_temp_dir, config_path) = temp_config_dir();
    let gateway_url = spawn_silent_gateway().await;

    let mut config = Config::default();
    config.status.port = port;
    config.status.bind = "127.0.0.1".to_string();
    config.session.gateway_url = gateway_url;
    config.relay.target_conversation = Some("1234567890@g.us".to_string());

    let bot_handle = tokio::spawn(async move {
        let _ = runtime::run_bot(config, config_path).await;
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("session").and_then(|v| v.as_str()), Some("connecting"));
                assert_eq!(
                    json.get("target").and_then(|v| v.as_str()),
                    Some("1234567890@g.us")
                );
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                assert!(json.get("startedAt").and_then(|v| v.as_str()).is_some());
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    bot_handle.abort();
    panic!(
        "GET {} did not return 200 with status JSON within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn status_reports_pairing_then_disconnected() {
    let port = free_port();
    let (_temp_dir, config_path) = temp_config_dir();
    let (disconnect_tx, disconnect_rx) = oneshot::channel();
    let gateway_url = spawn_pairing_gateway(disconnect_rx).await;

    let mut config = Config::default();
    config.status.port = port;
    config.session.gateway_url = gateway_url;
    config.relay.target_conversation = Some("1234567890@g.us".to_string());

    let bot_handle = tokio::spawn(async move {
        let _ = runtime::run_bot(config, config_path).await;
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();

    let status = poll_session_phase(&client, &url, "pairing").await;
    assert_eq!(
        status.get("pairingCode").and_then(|v| v.as_str()),
        Some("2@pair-code")
    );

    disconnect_tx.send(()).expect("signal disconnect");
    let status = poll_session_phase(&client, &url, "disconnected").await;
    assert_eq!(status["pairingCode"], serde_json::Value::Null);

    bot_handle.abort();
}

#[tokio::test]
async fn run_refuses_to_start_without_target() {
    let (_temp_dir, config_path) = temp_config_dir();

    let mut config = Config::default();
    config.status.port = free_port();
    config.relay.target_conversation = None;

    let err = runtime::run_bot(config, config_path)
        .await
        .expect_err("missing target must fail startup");
    assert!(err.to_string().contains("target conversation"));
}

#[tokio::test]
async fn run_refuses_non_loopback_bind() {
    let (_temp_dir, config_path) = temp_config_dir();

    let mut config = Config::default();
    config.status.bind = "0.0.0.0".to_string();
    config.relay.target_conversation = Some("1234567890@g.us".to_string());

    let err = runtime::run_bot(config, config_path)
        .await
        .expect_err("non-loopback bind must fail startup");
    assert!(err.to_string().contains("loopback"));
}
