//! Processing service client (http://127.0.0.1:5000 by default).

use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Client for the processing service HTTP API.
#[derive(Clone)]
pub struct ProcessorClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("processor request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("processor api error: {0}")]
    Api(String),
}

/// Payload for POST /process: sender, text, optional attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub sender: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
}

/// Attachment forwarded verbatim: MIME type and base64 data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mimetype: String,
    pub data: String,
}

/// Response body of POST /process. Only `reply` is interpreted.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub reply: Option<String>,
}

impl ProcessorClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// POST /process: submit one message payload and await the reply.
    pub async fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse, ProcessorError> {
        let url = format!("{}/process", self.base_url);
        let res = self.client.post(&url).json(request).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ProcessorError::Api(format!("{} {}", status, body)));
        }
        let data: ProcessResponse = res.json().await?;
        Ok(data)
    }
}
