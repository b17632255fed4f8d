//! Orderflow Client SDK.
//!
//! This crate provides a client library for submitting order events to the
//! orderflow service and reading its segments, summaries and counters.
//!
//! # Example
//!
//! ```no_run
//! use chrono::DateTime;
//! use orderflow_client::{OrderflowClient, SummaryQuery};
//! use orderflow_core::{OrderEvent, UserId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OrderflowClient::new("http://orderflow.internal:8080")?;
//!
//! let event = OrderEvent::new(
//!     UserId::new("u1")?,
//!     DateTime::parse_from_rfc3339("2025-05-31T10:00:00+09:00")?,
//!     "washoku",
//! );
//! client.submit_order(&event).await?;
//!
//! for row in client.summaries(SummaryQuery::All).await? {
//!     println!("{} {:?}: {}", row.date, row.segment, row.total_count);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, OrderflowClient};
pub use error::ClientError;
pub use types::*;
