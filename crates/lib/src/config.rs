//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.warelay/config.json`) and environment.
//! Kept minimal: session gateway, relay target, processor endpoint, status port.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Session gateway connection settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Relay settings (target conversation, fallback reply).
    #[serde(default)]
    pub relay: RelayConfig,

    /// Processing service settings.
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Status endpoint settings.
    #[serde(default)]
    pub status: StatusConfig,
}

/// Where the session gateway sidecar listens and how patient startup is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// WebSocket URL of the session gateway (default "ws://127.0.0.1:3010/ws").
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Connection attempts before startup fails (default 30, one per second).
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_gateway_url() -> String {
    crate::session::DEFAULT_GATEWAY_URL.to_string()
}

fn default_connect_attempts() -> u32 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

/// Relay routing: which conversation is forwarded, and what to say on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Conversation id whose messages are forwarded (e.g. a group id like
    /// "1234567890@g.us"). Overridden by WARELAY_TARGET_CONVERSATION env.
    pub target_conversation: Option<String>,

    /// Text sent into the conversation when a relay attempt fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

fn default_fallback_reply() -> String {
    "server error, try again later".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target_conversation: None,
            fallback_reply: default_fallback_reply(),
        }
    }
}

/// Processing service endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorConfig {
    /// Base URL of the processing service (default "http://127.0.0.1:5000").
    /// Overridden by WARELAY_PROCESSOR_URL env.
    pub base_url: Option<String>,
}

/// Status endpoint bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusConfig {
    /// Port for the status HTTP endpoint (default 15252).
    #[serde(default = "default_status_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"). Must be loopback; there is no auth.
    #[serde(default = "default_status_bind")]
    pub bind: String,
}

fn default_status_port() -> u16 {
    15252
}

fn default_status_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            port: default_status_port(),
            bind: default_status_bind(),
        }
    }
}

/// Resolve the target conversation: env WARELAY_TARGET_CONVERSATION overrides config.
pub fn resolve_target_conversation(config: &Config) -> Option<String> {
    std::env::var("WARELAY_TARGET_CONVERSATION")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .relay
                .target_conversation
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the processor base URL: env WARELAY_PROCESSOR_URL overrides config.
/// None means the client default.
pub fn resolve_processor_url(config: &Config) -> Option<String> {
    std::env::var("WARELAY_PROCESSOR_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .processor
                .base_url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the session gateway URL: env WARELAY_GATEWAY_URL overrides config.
pub fn resolve_gateway_url(config: &Config) -> String {
    std::env::var("WARELAY_GATEWAY_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.session.gateway_url.trim().to_string())
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("WARELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".warelay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or WARELAY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_port_and_bind() {
        let s = StatusConfig::default();
        assert_eq!(s.port, 15252);
        assert_eq!(s.bind, "127.0.0.1");
    }

    #[test]
    fn default_relay_has_fallback_but_no_target() {
        let r = RelayConfig::default();
        assert!(r.target_conversation.is_none());
        assert_eq!(r.fallback_reply, "server error, try again later");
    }

    #[test]
    fn parses_camel_case_fields() {
        let config: Config = serde_json::from_str(
            r#"{
                "session": { "gatewayUrl": "ws://127.0.0.1:4000/ws", "connectAttempts": 5 },
                "relay": { "targetConversation": "1234567890@g.us" },
                "processor": { "baseUrl": "http://127.0.0.1:5001" }
            }"#,
        )
        .expect("parse config");
        assert_eq!(config.session.gateway_url, "ws://127.0.0.1:4000/ws");
        assert_eq!(config.session.connect_attempts, 5);
        assert_eq!(
            config.relay.target_conversation.as_deref(),
            Some("1234567890@g.us")
        );
        assert_eq!(config.processor.base_url.as_deref(), Some("http://127.0.0.1:5001"));
        assert_eq!(config.status.port, 15252);
    }

    #[test]
    fn blank_target_resolves_to_none() {
        let mut config = Config::default();
        config.relay.target_conversation = Some("   ".to_string());
        assert_eq!(resolve_target_conversation(&config), None);
    }
}
