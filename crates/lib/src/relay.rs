//! The message relay: forward payloads from the target conversation to the
//! processing service and send replies back.

use std::sync::Arc;

use crate::processor::{ImagePayload, ProcessRequest, ProcessorClient, ProcessorError};
use crate::session::{InboundMessage, SessionError, SessionHandle};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("processor error: {0}")]
    Processor(#[from] ProcessorError),
}

/// Everything one relay invocation needs. Cloned into each handler task.
#[derive(Clone)]
pub struct Relay {
    pub target_conversation: String,
    pub fallback_reply: String,
    pub session: Arc<dyn SessionHandle>,
    pub processor: ProcessorClient,
}

impl Relay {
    /// Process one inbound message end to end. Never returns an error: a
    /// failed relay is logged and answered with the fixed fallback reply,
    /// best-effort.
    pub async fn process_message(&self, msg: InboundMessage) {
        log::info!("message received in {}: {:?}", msg.from, msg.body);
        if msg.from != self.target_conversation {
            return;
        }
        if let Err(e) = self.handle(&msg).await {
            log::warn!("relay failed for message {}: {}", msg.id, e);
            if let Err(send_err) = self
                .session
                .send_message(&msg.from, &self.fallback_reply)
                .await
            {
                log::debug!("fallback reply failed: {}", send_err);
            }
        }
    }

    /// The fallible part: build the payload (fetching media on demand), post
    /// it, relay a non-empty reply. The payload is sent in full or not at all.
    async fn handle(&self, msg: &InboundMessage) -> Result<(), RelayError> {
        let mut request = ProcessRequest {
            sender: msg.from.clone(),
            message: msg.body.clone(),
            image: None,
        };
        if msg.has_media {
            let media = self.session.fetch_media(&msg.id).await?;
            request.image = Some(ImagePayload {
                mimetype: media.mimetype,
                data: media.data,
            });
        }

        let response = self.processor.process(&request).await?;
        if let Some(reply) = response.reply.filter(|r| !r.is_empty()) {
            self.session.send_message(&msg.from, &reply).await?;
        }
        Ok(())
    }
}
