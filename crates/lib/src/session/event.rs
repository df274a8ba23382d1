//! Session events and message types as delivered by the gateway.

use serde::{Deserialize, Serialize};

/// Lifecycle and message events pushed by the session gateway.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Pairing code issued; the operator scans it to link the session.
    PairingCode(String),
    /// Session authenticated and able to send and receive.
    Ready,
    /// A message arrived in some conversation.
    Message(InboundMessage),
    /// The gateway lost its WhatsApp Web connection.
    Disconnected { reason: String },
}

/// One inbound message. `id` backs the on-demand media fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub id: String,
    /// Conversation the message arrived in (chat or group id).
    pub from: String,
    /// Text body; empty for caption-less media messages.
    #[serde(default)]
    pub body: String,
    /// True when the message carries a downloadable attachment.
    #[serde(default)]
    pub has_media: bool,
}

/// Downloaded attachment: MIME type plus base64 payload, passed through as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    pub mimetype: String,
    pub data: String,
}

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Gateway connection is up, waiting for the session to authenticate.
    Connecting,
    /// Waiting for the operator to scan the pairing code.
    Pairing(String),
    Ready,
    Disconnected,
}

impl SessionPhase {
    /// Short name for logs and the status endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Pairing(_) => "pairing",
            SessionPhase::Ready => "ready",
            SessionPhase::Disconnected => "disconnected",
        }
    }
}
