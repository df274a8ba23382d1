//! Object-safe handle to a live messaging session.

use async_trait::async_trait;

use crate::session::event::MediaPayload;

/// Errors from the session gateway connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("gateway websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("gateway connection closed")]
    ConnectionClosed,
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error("gateway frame error: {0}")]
    Frame(#[from] serde_json::Error),
}

/// Send and fetch capabilities of a connected session. The relay is written
/// against this trait; tests substitute a recording implementation.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Send a text message into a conversation.
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), SessionError>;

    /// Download the attachment of a previously received message.
    async fn fetch_media(&self, message_id: &str) -> Result<MediaPayload, SessionError>;
}
