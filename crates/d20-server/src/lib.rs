//! d20 table server.
//!
//! This crate provides the HTTP front end for a shared dice table using:
//! - Axum for routing and server-sent events
//! - Tokio for async runtime
//! - System time and cryptographic RNG
//!
//! ## Architecture
//!
//! ```text
//! d20-server
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ TableConfig        (party key, facilitator name, roll limits)
//!   ├─ AppState           (codec + dice + table + hub, shared by handlers)
//!   ├─ auth               (session cookie extractors)
//!   ├─ handlers           (join, roll, stats, history)
//!   └─ sse                (one Observer per event stream)
//! ```
//!
//! ## Routes
//!
//! | Route                | Access      |
//! |----------------------|-------------|
//! | `POST /join`         | anyone      |
//! | `POST /logout`       | anyone      |
//! | `GET /session`       | participant |
//! | `GET /history`       | participant |
//! | `GET /stats`         | participant |
//! | `POST /roll`         | participant |
//! | `GET /events`        | participant |
//! | `POST /private-roll` | facilitator |
//! | `POST /facilitator`  | facilitator |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
mod error;
pub mod handlers;
pub mod sse;
mod state;
mod system_env;

use std::{net::SocketAddr, path::PathBuf};

use axum::{
    Router,
    routing::{get, post},
};
pub use config::{ConfigError, TableConfig};
use d20_core::{Environment, HubConfig};
pub use error::{ApiError, ServerError};
pub use state::AppState;
pub use system_env::SystemEnv;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Table settings
    pub table: TableConfig,
    /// Directory served under `/static`, if any
    pub static_dir: Option<PathBuf>,
    /// Observer fan-out settings
    pub hub: HubConfig,
}

/// Build the API router over `state`.
pub fn router<E: Environment>(state: AppState<E>) -> Router {
    Router::new()
        .route("/join", post(handlers::join::<E>))
        .route("/logout", post(handlers::logout))
        .route("/session", get(handlers::session))
        .route("/history", get(handlers::history::<E>))
        .route("/stats", get(handlers::stats::<E>))
        .route("/roll", post(handlers::roll::<E>))
        .route("/private-roll", post(handlers::private_roll::<E>))
        .route("/facilitator", post(handlers::update_stats::<E>))
        .route("/events", get(sse::events::<E>))
        .with_state(state)
}

/// Production d20 server.
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The table configuration is invalid
    /// - The session key cannot be generated
    /// - Binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.table.validate()?;

        let state = AppState::new(SystemEnv::new(), config.table, config.hub)?;
        let mut app = router(state);
        if let Some(dir) = config.static_dir {
            tracing::info!("Serving static files from {}", dir.display());
            app = app.nest_service("/static", ServeDir::new(dir));
        }
        let app = app.layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { listener, app })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        axum::serve(self.listener, self.app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
