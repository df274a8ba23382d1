//! Bot runtime: wires the session gateway event stream into relay handler
//! tasks and serves the status endpoint.

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{self, Config};
use crate::init;
use crate::processor::ProcessorClient;
use crate::relay::Relay;
use crate::session::{SessionEvent, SessionGateway, SessionHandle, SessionPhase};

/// Shared runtime state (cloned into tasks and the status route).
#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub relay: Relay,
    pub session_phase: Arc<RwLock<SessionPhase>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Run the bot; blocks until shutdown (e.g. Ctrl+C).
/// Requires the configuration to be initialized (`warelay init`) and a target
/// conversation to be set. The status endpoint binds loopback only.
pub async fn run_bot(config: Config, config_path: PathBuf) -> Result<()> {
    init::require_initialized(&config_path)?;
    let Some(target) = config::resolve_target_conversation(&config) else {
        anyhow::bail!(
            "no target conversation configured; set relay.targetConversation in {} or WARELAY_TARGET_CONVERSATION",
            config_path.display()
        );
    };
    let bind = config.status.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) {
        anyhow::bail!(
            "refusing to bind status endpoint to {} (loopback only, there is no auth)",
            bind
        );
    }

    let gateway_url = config::resolve_gateway_url(&config);
    let (session, mut events) =
        SessionGateway::connect(&gateway_url, config.session.connect_attempts)
            .await
            .with_context(|| format!("connecting to session gateway at {}", gateway_url))?;
    let session: Arc<dyn SessionHandle> = session;

    let relay = Relay {
        target_conversation: target,
        fallback_reply: config.relay.fallback_reply.clone(),
        session,
        processor: ProcessorClient::new(config::resolve_processor_url(&config)),
    };

    let state = BotState {
        config: Arc::new(config.clone()),
        relay,
        session_phase: Arc::new(RwLock::new(SessionPhase::Connecting)),
        started_at: chrono::Utc::now(),
    };

    {
        let pump_state = state.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handle_session_event(&pump_state, event).await;
            }
            log::warn!("session event stream ended");
            *pump_state.session_phase.write().await = SessionPhase::Disconnected;
        });
    }

    let app = Router::new().route("/", get(status_http)).with_state(state);

    let bind_addr = format!("{}:{}", bind, config.status.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("status endpoint listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("status server exited")?;
    log::info!("bot stopped");
    Ok(())
}

/// Apply one session event: track the phase, spawn a relay task per message.
async fn handle_session_event(state: &BotState, event: SessionEvent) {
    match event {
        SessionEvent::PairingCode(code) => {
            log::info!("pairing code received, scan it to link the session: {}", code);
            *state.session_phase.write().await = SessionPhase::Pairing(code);
        }
        SessionEvent::Ready => {
            log::info!("session ready");
            *state.session_phase.write().await = SessionPhase::Ready;
        }
        SessionEvent::Message(msg) => {
            let relay = state.relay.clone();
            tokio::spawn(async move {
                relay.process_message(msg).await;
            });
        }
        SessionEvent::Disconnected { reason } => {
            log::warn!("session disconnected: {}", reason);
            *state.session_phase.write().await = SessionPhase::Disconnected;
        }
    }
}

/// GET / returns a status JSON (for health checks and for reading the pairing code).
async fn status_http(State(state): State<BotState>) -> Json<serde_json::Value> {
    let phase = state.session_phase.read().await.clone();
    let pairing_code = match &phase {
        SessionPhase::Pairing(code) => Some(code.clone()),
        _ => None,
    };
    Json(json!({
        "runtime": "running",
        "session": phase.as_str(),
        "pairingCode": pairing_code,
        "target": state.relay.target_conversation,
        "port": state.config.status.port,
        "startedAt": state.started_at.to_rfc3339(),
    }))
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
