//! WebSocket client for the session gateway sidecar.
//!
//! The sidecar owns the WhatsApp Web connection (credentials, pairing, the
//! protocol itself) and exposes it on a local WebSocket: it pushes session
//! events and answers `message.send` / `media.fetch` requests.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::session::event::{InboundMessage, MediaPayload, SessionEvent};
use crate::session::handle::{SessionError, SessionHandle};
use crate::session::protocol::{EventFrame, GatewayFrame, RequestFrame, ResponseFrame};

pub const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:3010/ws";

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// In-flight calls keyed by request id. The reader task sets `closed` on
/// teardown; calls issued after that fail with `ConnectionClosed`.
struct Pending {
    closed: bool,
    calls: HashMap<String, oneshot::Sender<ResponseFrame>>,
}

/// Client half of the gateway connection: sends requests, correlates responses
/// by id. Session events arrive on the channel returned by `connect`.
pub struct SessionGateway {
    request_tx: mpsc::UnboundedSender<Message>,
    pending: Arc<Mutex<Pending>>,
}

impl SessionGateway {
    /// Connect to the gateway, retrying up to `attempts` times (one second
    /// apart). Returns the client handle and the stream of session events.
    pub async fn connect(
        url: &str,
        attempts: u32,
    ) -> Result<(Arc<Self>, mpsc::Receiver<SessionEvent>), SessionError> {
        let attempts = attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match tokio_tungstenite::connect_async(url).await {
                Ok((ws, _)) => {
                    log::info!("connected to session gateway at {}", url);
                    return Ok(Self::start(ws));
                }
                Err(e) => {
                    log::warn!(
                        "session gateway connect attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        e
                    );
                    last_err = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
        Err(last_err
            .map(SessionError::WebSocket)
            .unwrap_or(SessionError::ConnectionClosed))
    }

    /// Split the socket into a writer task and a reader task. The reader
    /// resolves pending calls and pushes decoded events; when the connection
    /// drops it clears the pending map so in-flight calls fail.
    fn start(
        ws: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    ) -> (Arc<Self>, mpsc::Receiver<SessionEvent>) {
        let (mut sink, mut stream) = ws.split();
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(64);
        let pending = Arc::new(Mutex::new(Pending {
            closed: false,
            calls: HashMap::new(),
        }));

        tokio::spawn(async move {
            while let Some(msg) = request_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(t)) => t,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!("session gateway read error: {}", e);
                        break;
                    }
                };
                let frame: GatewayFrame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        log::debug!("ignoring unparseable gateway frame: {}", e);
                        continue;
                    }
                };
                match frame {
                    GatewayFrame::Res(res) => {
                        let mut pending = reader_pending.lock().await;
                        if let Some(tx) = pending.calls.remove(&res.id) {
                            // The caller may have gone away; ignore the send error.
                            let _ = tx.send(res);
                        }
                    }
                    GatewayFrame::Event(event) => {
                        let Some(decoded) = decode_event(event) else {
                            continue;
                        };
                        if event_tx.send(decoded).await.is_err() {
                            break;
                        }
                    }
                }
            }
            {
                let mut pending = reader_pending.lock().await;
                pending.closed = true;
                // Dropping the senders resolves every in-flight call with an error.
                pending.calls.clear();
            }
            log::info!("session gateway connection closed");
        });

        (Arc::new(Self { request_tx, pending }), event_rx)
    }

    /// Send one request and wait for the matching response payload.
    /// No RPC timeout: a closed connection drops the pending sender, which
    /// resolves the receiver with an error, and calls issued after the close
    /// fail immediately.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SessionError> {
        let frame = RequestFrame::new(method, params);
        let id = frame.id.clone();

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(SessionError::ConnectionClosed);
            }
            pending.calls.insert(id.clone(), tx);
        }

        let json = serde_json::to_string(&frame)?;
        if self.request_tx.send(Message::Text(json)).is_err() {
            self.pending.lock().await.calls.remove(&id);
            return Err(SessionError::ConnectionClosed);
        }

        match rx.await {
            Ok(res) if res.ok => Ok(res.payload.unwrap_or(serde_json::Value::Null)),
            Ok(res) => Err(SessionError::Gateway(
                res.error.unwrap_or_else(|| "unknown gateway error".to_string()),
            )),
            Err(_) => {
                self.pending.lock().await.calls.remove(&id);
                Err(SessionError::ConnectionClosed)
            }
        }
    }
}

#[async_trait]
impl SessionHandle for SessionGateway {
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), SessionError> {
        self.call("message.send", json!({ "to": conversation_id, "text": text }))
            .await
            .map(|_| ())
    }

    async fn fetch_media(&self, message_id: &str) -> Result<MediaPayload, SessionError> {
        let payload = self.call("media.fetch", json!({ "messageId": message_id })).await?;
        Ok(serde_json::from_value(payload)?)
    }
}

/// Map a wire event onto a session event. Unknown events are dropped.
fn decode_event(frame: EventFrame) -> Option<SessionEvent> {
    match frame.event.as_str() {
        "session.pairing" => match frame.payload.get("code").and_then(|v| v.as_str()) {
            Some(code) => Some(SessionEvent::PairingCode(code.to_string())),
            None => {
                log::debug!("ignoring session.pairing event without a code");
                None
            }
        },
        "session.ready" => Some(SessionEvent::Ready),
        "session.message" => match serde_json::from_value::<InboundMessage>(frame.payload) {
            Ok(msg) => Some(SessionEvent::Message(msg)),
            Err(e) => {
                log::debug!("ignoring malformed session.message payload: {}", e);
                None
            }
        },
        "session.disconnected" => {
            let reason = frame
                .payload
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            Some(SessionEvent::Disconnected { reason })
        }
        other => {
            log::debug!("ignoring unknown gateway event: {}", other);
            None
        }
    }
}
