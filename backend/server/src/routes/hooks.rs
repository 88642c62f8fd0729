use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State as AxumState, rejection::JsonRejection},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use remote::models::RowChange;
use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    state::State,
};

pub const SECRET_HEADER: &str = "X-Webhook-Secret";

/// Database-webhook delivery from the hosted backend, fed to every follower
/// of the change feed.
pub async fn site_config(
    AxumState(state): AxumState<Arc<State>>,
    payload: Result<Json<RowChange>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(change) = payload.map_err(|e| AppError::MalformedPayload(e.body_text()))?;

    debug!("Webhook {:?} on {}", change.kind, change.table.as_str());
    state.backend.changes().publish(change);

    Ok(StatusCode::ACCEPTED)
}

/// Open when no secret is configured.
pub async fn require_secret(
    AxumState(state): AxumState<Arc<State>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(secret) = &state.config.webhook_secret else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(value) if value == secret => Ok(next.run(req).await),
        Some(_) => {
            warn!("Webhook rejected: wrong secret on {}", req.uri());
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!("Webhook rejected: missing {SECRET_HEADER} on {}", req.uri());
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
