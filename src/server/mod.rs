//! HTTP surface
//!
//! axum server exposing the per-request prediction pipeline. Pipeline
//! errors are reported in-band with HTTP 200; only routing-level
//! conditions (unknown path, wrong method) use other status codes.

mod api;
mod handlers;
mod state;

pub use api::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_path: String,
    pub cors_origin: Option<String>,
    pub synthetic_samples: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_path: std::env::var("DATA_PATH")
                .unwrap_or_else(|_| "./data/osteoporosis.csv".to_string()),
            cors_origin: std::env::var("CORS_ORIGIN").ok(),
            synthetic_samples: std::env::var("SYNTHETIC_SAMPLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(400),
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    if !std::path::Path::new(&config.data_path).exists() {
        warn!(
            data_path = %config.data_path,
            "dataset file not found, requests will use the synthetic provider"
        );
    }

    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        data_path = %config.data_path,
        started_at = %start_time.to_rfc3339(),
        "bonehealth server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install CTRL+C signal handler");
            return;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.data_path.ends_with("osteoporosis.csv"));
    }
}
