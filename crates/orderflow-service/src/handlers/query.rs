//! Read-only query handlers over the aggregate tables.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orderflow_core::{DateFilter, MenuType, Segment, UserCounts, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Segments response.
#[derive(Debug, Serialize)]
pub struct SegmentsResponse {
    /// One entry per menu type, empty segments included.
    pub cuisines: Vec<Segment>,
}

/// List users grouped by preferred menu type.
pub async fn list_segments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SegmentsResponse>, ApiError> {
    let preferences = state.store.list_user_preferences()?;

    let cuisines = MenuType::ALL
        .into_iter()
        .map(|segment| {
            let mut users: Vec<UserId> = preferences
                .iter()
                .filter(|(_, menu)| *menu == segment)
                .map(|(user, _)| user.clone())
                .collect();
            users.sort();
            Segment {
                segment,
                count: users.len(),
                users,
            }
        })
        .collect();

    Ok(Json(SegmentsResponse { cuisines }))
}

/// Summary query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    /// Single date, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Inclusive range start.
    pub from: Option<String>,
    /// Inclusive range end.
    pub to: Option<String>,
}

impl SummaryParams {
    /// Turn the parameters into a date filter.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for unparsable dates, `date` combined with
    /// a range, a half-open range, or `from` after `to`.
    pub fn filter(&self) -> Result<DateFilter, ApiError> {
        match (&self.date, &self.from, &self.to) {
            (None, None, None) => Ok(DateFilter::All),
            (Some(date), None, None) => Ok(DateFilter::On(parse_date("date", date)?)),
            (None, Some(from), Some(to)) => {
                let from = parse_date("from", from)?;
                let to = parse_date("to", to)?;
                if from > to {
                    return Err(ApiError::BadRequest(format!(
                        "from ({from}) is after to ({to})"
                    )));
                }
                Ok(DateFilter::Between(from, to))
            }
            (Some(_), _, _) => Err(ApiError::BadRequest(
                "date cannot be combined with from/to".into(),
            )),
            (None, _, _) => Err(ApiError::BadRequest(
                "from and to must be given together".into(),
            )),
        }
    }
}

/// Parse a `YYYY-MM-DD` date parameter.
pub(crate) fn parse_date(name: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!("{name} must be a YYYY-MM-DD date, got {value:?}"))
    })
}

/// One daily summary row.
#[derive(Debug, Serialize)]
pub struct SummaryRow {
    /// Order date.
    pub date: NaiveDate,
    /// Menu type.
    pub segment: MenuType,
    /// Orders of that menu type on that date.
    pub total_count: i64,
}

/// Summaries response.
#[derive(Debug, Serialize)]
pub struct SummariesResponse {
    /// Rows ordered by date, then menu type.
    pub summaries: Vec<SummaryRow>,
}

/// List daily per-menu-type order counts.
pub async fn list_summaries(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SummaryParams>, QueryRejection>,
) -> Result<Json<SummariesResponse>, ApiError> {
    let Query(params) = params?;
    let filter = params.filter()?;

    let summaries = state
        .store
        .list_daily_summaries(filter)?
        .into_iter()
        .map(|s| SummaryRow {
            date: s.date,
            segment: s.menu_type,
            total_count: s.count,
        })
        .collect();

    Ok(Json(SummariesResponse { summaries }))
}

/// Running counters of one user.
pub async fn get_user_counts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserCounts>, ApiError> {
    let user_id = UserId::new(user_id)
        .map_err(|_| ApiError::BadRequest("user_id must not be empty".into()))?;

    state
        .store
        .get_user_counts(&user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no orders counted for user {user_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(date: Option<&str>, from: Option<&str>, to: Option<&str>) -> SummaryParams {
        SummaryParams {
            date: date.map(String::from),
            from: from.map(String::from),
            to: to.map(String::from),
        }
    }

    #[test]
    fn summary_filter_parsing() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

        assert_eq!(params(None, None, None).filter().unwrap(), DateFilter::All);
        assert_eq!(
            params(Some("2025-05-31"), None, None).filter().unwrap(),
            DateFilter::On(d("2025-05-31"))
        );
        assert_eq!(
            params(None, Some("2025-05-01"), Some("2025-05-31"))
                .filter()
                .unwrap(),
            DateFilter::Between(d("2025-05-01"), d("2025-05-31"))
        );
    }

    #[test]
    fn summary_filter_rejections() {
        for bad in [
            params(Some("31/05/2025"), None, None),
            params(Some("2025-05-31"), Some("2025-05-01"), Some("2025-05-31")),
            params(None, Some("2025-05-01"), None),
            params(None, Some("2025-06-01"), Some("2025-05-31")),
        ] {
            assert!(matches!(bad.filter(), Err(ApiError::BadRequest(_))));
        }
    }
}
