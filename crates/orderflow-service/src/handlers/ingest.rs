//! Order ingest handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use orderflow_core::{OrderEvent, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Order submitted by a client.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    /// Ordering user.
    pub user_id: String,
    /// RFC 3339 timestamp, with offset.
    pub timestamp: String,
    /// Menu type. Not validated here.
    pub menu_type: String,
}

/// Ingest acknowledgement.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always `"ok"`.
    pub status: &'static str,
}

/// Append one order event to the log.
///
/// Responds after the append is acknowledged. No event id is returned, so a
/// client retry produces a duplicate event.
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(body) = body?;

    let user_id = UserId::new(body.user_id)
        .map_err(|_| ApiError::BadRequest("user_id must not be empty".into()))?;
    let timestamp = DateTime::parse_from_rfc3339(&body.timestamp).map_err(|e| {
        ApiError::BadRequest(format!("invalid timestamp {:?}: {e}", body.timestamp))
    })?;
    let event = OrderEvent::new(user_id, timestamp, body.menu_type);

    state.producer.submit(&event).map_err(|e| {
        tracing::warn!(user_id = %event.user_id, error = %e, "Failed to append order");
        ApiError::from(e)
    })?;

    Ok(Json(IngestResponse { status: "ok" }))
}
