//! Ingest-to-storage pipeline for orderflow.
//!
//! ```text
//! HTTP ──▶ OrderProducer ──▶ EventLog ──▶ ConsumerLoop ──▶ StorageWriter ──▶ Store
//!                                                                             ▲
//!                                                     Aggregator ─────────────┘
//! ```
//!
//! - [`OrderProducer`] encodes events and appends them keyed by user id.
//! - [`ConsumerLoop`] polls the log as a consumer-group member, decodes each
//!   record, hands it to the [`StorageWriter`] and commits the offset.
//! - [`StorageWriter`] inserts the raw fact row, then increments the user's counter.
//! - [`Aggregator`] turns a day of raw facts into daily summaries and preferences.
//!
//! # Delivery semantics
//!
//! At-least-once, with liveness over completeness: the consumer commits past
//! records whose apply failed, so a store outage loses those updates instead
//! of stalling the log. A crash between apply and commit redelivers the record
//! and counts it twice.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod aggregator;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod writer;

pub use aggregator::{AggregateReport, Aggregator};
pub use consumer::{ConsumerLoop, ConsumerStats, RecordOutcome, DEFAULT_POLL_BACKOFF};
pub use error::{PipelineError, Result};
pub use producer::OrderProducer;
pub use writer::{OrderHandler, StorageWriter, WriteOutcome};
