//! Session provisioning endpoint
//!
//! Mints an ephemeral upstream credential and registers the session. The
//! long-lived provider key never leaves the gateway.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::registry::SessionMode;

/// Session creation request body
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Capture mode; defaults to screen
    #[serde(default)]
    pub mode: Option<SessionMode>,
}

/// Error payload for failed requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `POST /api/session` — mint an ephemeral credential for a new session
pub async fn create_session(
    State(state): State<Arc<ApiState>>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<Json<crate::EphemeralCredential>, (StatusCode, Json<ErrorResponse>)> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let mode = request.mode.unwrap_or(SessionMode::Screen);

    let active = state.registry.count().await;
    if active >= state.config.server.max_sessions {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: "Session limit reached, try again later".to_string(),
            }),
        ));
    }

    let credential = state.minter.mint().await.map_err(|e| {
        tracing::error!(error = %e, "failed to mint session credential");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let record = state.registry.create(&credential.id, mode).await;
    tracing::info!(session = %record.id, mode = ?record.mode, "session provisioned");

    Ok(Json(credential))
}
