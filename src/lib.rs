//! Fitgate - privileged membership lifecycle service for gym organizations
//!
//! Fitgate sits in front of a hosted identity platform and exposes the
//! privileged actions an organization owner or admin performs on member
//! accounts: inviting a user, deleting a user, and resetting a password
//! that has never been changed. Every action authenticates the caller with
//! the caller-scoped credential, checks their role, and reconciles the
//! target's organization membership across the identity record and the
//! application's own profile row before writing anything.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fitgate::{ConfigBuilder, RestDirectory};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build();
//!     fitgate::init_tracing_with_config(&config);
//!
//!     let directory = RestDirectory::new(&config.platform)?;
//!
//!     fitgate::serve(config, directory).await?;
//!     Ok(())
//! }
//! ```

mod config;
pub mod cors;
mod error;
pub mod http;
pub mod lifecycle;
pub mod store;

pub use config::{Config, ConfigBuilder, LoggingConfig, PlatformConfig, ServerConfig};
pub use cors::CorsConfig;
pub use error::{ErrorBody, FitgateError, Result};
pub use http::{AppState, Directory, router};
pub use store::RestDirectory;

use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with environment-based filtering.
///
/// Reads `RUST_LOG` for the filter (defaults to `info`) and switches to
/// JSON output when `FITGATE_LOG_JSON=true`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("FITGATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from a [`Config`].
///
/// Uses `config.logging.level` as the filter and `config.logging.json`
/// to select the output format, so `FITGATE_LOG_LEVEL` and
/// `FITGATE_LOG_JSON` loaded by [`ConfigBuilder::from_env`] take effect.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Bind the configured address and serve the lifecycle routes until a
/// shutdown signal arrives.
pub async fn serve<D: Directory>(config: Config, directory: D) -> Result<()> {
    let addr = config
        .server
        .addr()
        .map_err(|e| FitgateError::internal(format!("invalid server address: {e}")))?;

    let state = Arc::new(AppState::new(directory));
    let mut app = router(state).layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors::build_cors_layer(&config.cors) {
        app = app.layer(cors_layer);
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| FitgateError::internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("Server starting on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| FitgateError::internal(format!("server error: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
