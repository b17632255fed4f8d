//! API handlers.

pub mod aggregate;
pub mod health;
pub mod ingest;
pub mod query;
