//! Aggregation trigger.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use orderflow_pipeline::{AggregateReport, Aggregator};

use crate::error::ApiError;
use crate::handlers::query::parse_date;
use crate::state::AppState;

/// Aggregation request. An empty body aggregates the previous UTC day.
#[derive(Debug, Default, Deserialize)]
pub struct AggregateRequest {
    /// Day to aggregate, `YYYY-MM-DD`.
    pub date: Option<String>,
}

/// Rebuild daily summaries and user preferences for one day.
pub async fn run_aggregation(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AggregateReport>, ApiError> {
    let request: AggregateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AggregateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid aggregate request: {e}")))?
    };

    let date = match request.date.as_deref() {
        Some(date) => parse_date("date", date)?,
        None => Aggregator::previous_day(Utc::now()),
    };

    tracing::info!(date = %date, "Aggregation requested");
    let report = state.aggregator.aggregate_blocking(date).await?;
    Ok(Json(report))
}
