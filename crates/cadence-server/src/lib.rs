pub mod auth;
pub mod rest;
pub mod state;

use std::sync::Arc;

use cadence_core::{CadenceError, CdResult};
use cadence_engine::{CadenceEngine, EngineConfig};

use crate::rest::create_router_with_cors;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub rest_port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub engine_config: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".into(),
            rest_port: 9620,
            cors_allowed_origins: Vec::new(),
            engine_config: EngineConfig::default(),
        }
    }
}

/// Initialize the engine and serve the REST API until ctrl-c.
pub async fn start_server(config: ServerConfig) -> CdResult<()> {
    let engine = CadenceEngine::init(config.engine_config)?;
    let state = Arc::new(AppState::new(Arc::new(engine)));
    let router = create_router_with_cors(state, &config.cors_allowed_origins);

    let addr = format!("{}:{}", config.bind_host, config.rest_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CadenceError::Internal(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "REST server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CadenceError::Internal(format!("server error: {e}")))?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::warn!("failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
