//! HTTP API server for the Iris gateway

pub mod health;
pub mod rate_limit;
pub mod session;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::credentials::CredentialMinter;
use crate::registry::SessionRegistry;
use crate::vision::captioner::Captioner;
use crate::{Config, Result};

/// Shared state for API handlers
pub struct ApiState {
    /// Resolved gateway configuration
    pub config: Config,
    /// Active session metadata
    pub registry: SessionRegistry,
    /// Ephemeral credential minter
    pub minter: CredentialMinter,
    /// Captioning collaborator handed to each session
    pub captioner: Arc<dyn Captioner>,
    /// Request limiter for `/api` routes
    pub rate_limiter: rate_limit::SharedLimiter,
}

impl ApiState {
    /// Assemble shared state from configuration
    #[must_use]
    pub fn new(config: Config, captioner: Arc<dyn Captioner>) -> Self {
        let rate_limiter = rate_limit::create_limiter(config.server.rate_limit_per_minute);
        let minter = CredentialMinter::new(config.credentials.clone());
        Self {
            config,
            registry: SessionRegistry::new(),
            minter,
            captioner,
            rate_limiter,
        }
    }
}

/// Build the gateway router
pub fn router(state: Arc<ApiState>) -> Router {
    let api = Router::new()
        .route("/session", post(session::create_session))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit::rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .route("/visual", get(websocket::ws_upgrade))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<ApiState>) -> Result<()> {
    let port = state.config.server.port;
    let app = router(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "iris gateway listening");

    axum::serve(listener, app).await?;

    Ok(())
}
