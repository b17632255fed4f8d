//! Orderflow HTTP service.
//!
//! This crate provides the HTTP boundary of the pipeline and the background
//! tasks that run next to it:
//!
//! - Order ingest (`POST /api/log`) appending to the durable log
//! - Read-only queries over segments, daily summaries and user counters
//! - An aggregation trigger and an optional aggregation schedule
//! - Consumer loops applying the log to the analytical store
//!
//! The log and the store are opened once by the binary and passed to every
//! handler and task through [`AppState`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod workers;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use workers::{spawn_aggregation, spawn_consumers};
