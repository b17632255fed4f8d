//! Request and response types for the orderflow client.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orderflow_core::MenuType;

pub use orderflow_core::{Segment, UserCounts};

/// Acknowledgement returned by the ingest endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestResponse {
    /// Always `"ok"` on success.
    pub status: String,
}

/// Preference segments.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentsResponse {
    /// One entry per menu type, empty segments included.
    pub cuisines: Vec<Segment>,
}

/// One daily summary row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SummaryRow {
    /// Summary date (UTC).
    pub date: NaiveDate,
    /// Menu type.
    pub segment: MenuType,
    /// Orders of this menu type on that date.
    pub total_count: i64,
}

/// Daily summaries listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SummariesResponse {
    /// Rows ordered by date, then menu type.
    pub summaries: Vec<SummaryRow>,
}

/// Filter for the summaries listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryQuery {
    /// Every stored summary.
    #[default]
    All,
    /// A single day.
    On(NaiveDate),
    /// An inclusive date range.
    Between {
        /// First day.
        from: NaiveDate,
        /// Last day.
        to: NaiveDate,
    },
}

impl SummaryQuery {
    /// Query parameters for this filter.
    pub(crate) fn params(self) -> Vec<(&'static str, String)> {
        match self {
            Self::All => Vec::new(),
            Self::On(date) => vec![("date", date.to_string())],
            Self::Between { from, to } => vec![("from", from.to_string()), ("to", to.to_string())],
        }
    }
}

/// Body of an aggregation request.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct AggregateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// Outcome of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AggregateReport {
    /// Aggregated date.
    pub date: NaiveDate,
    /// Washoku orders on that date.
    pub washoku: i64,
    /// Yoshoku orders on that date.
    pub yoshoku: i64,
    /// Fact rows with an unknown menu type.
    pub skipped: u64,
    /// Users whose preference was recomputed.
    pub users_updated: usize,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
}
