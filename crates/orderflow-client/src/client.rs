//! Orderflow HTTP client implementation.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};

use orderflow_core::OrderEvent;

use crate::error::ClientError;
use crate::types::{
    AggregateReport, AggregateRequest, ApiErrorResponse, IngestResponse, SegmentsResponse,
    SummariesResponse, SummaryQuery, SummaryRow, UserCounts,
};

/// Orderflow API client.
///
/// Submits order events and reads the derived read models.
#[derive(Debug, Clone)]
pub struct OrderflowClient {
    client: Client,
    base_url: String,
}

impl OrderflowClient {
    /// Create a new client with default options.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the orderflow service (e.g., `"http://orderflow:8080"`)
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Submit one order event.
    ///
    /// The service acknowledges once the event is in the durable log; counters
    /// update later. Retrying after an ambiguous failure may record the order
    /// twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the event.
    pub async fn submit_order(&self, event: &OrderEvent) -> Result<(), ClientError> {
        let url = format!("{}/api/log", self.base_url);
        tracing::debug!(user_id = %event.user_id, menu_type = %event.menu_type, "Submitting order");

        let response = self.client.post(&url).json(event).send().await?;
        let _: IngestResponse = self.handle_response(response).await?;
        Ok(())
    }

    /// List preference segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn segments(&self) -> Result<SegmentsResponse, ClientError> {
        let url = format!("{}/api/segments", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// List daily summaries matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn summaries(&self, query: SummaryQuery) -> Result<Vec<SummaryRow>, ClientError> {
        let url = format!("{}/api/summaries", self.base_url);
        let response = self.client.get(&url).query(&query.params()).send().await?;
        let body: SummariesResponse = self.handle_response(response).await?;
        Ok(body.summaries)
    }

    /// Get a user's order counters.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UserNotFound`] if no counters exist for the user,
    /// or another error if the request fails.
    pub async fn user_counts(&self, user_id: &str) -> Result<UserCounts, ClientError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Configuration("base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", "users", user_id, "counts"]);

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::UserNotFound {
                user_id: user_id.to_string(),
            });
        }
        self.handle_response(response).await
    }

    /// Run the daily aggregation for `date`, or for the previous UTC day.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn aggregate(&self, date: Option<NaiveDate>) -> Result<AggregateReport, ClientError> {
        let url = format!("{}/api/aggregate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AggregateRequest { date })
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => match api_error.error.code.as_str() {
                "bad_request" => Err(ClientError::BadRequest(api_error.error.message)),
                code => Err(ClientError::Api {
                    code: code.to_string(),
                    message: api_error.error.message,
                    status: status.as_u16(),
                }),
            },
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}
