//! Core types and utilities for orderflow.
//!
//! This crate provides the vocabulary shared by the producer, the consumer and the
//! query side of the pipeline:
//!
//! - **Identifiers**: `UserId`, `FactId`
//! - **Orders**: `OrderEvent`, `MenuType`
//! - **Wire format**: `encode`, `decode`
//! - **Read models**: `RawOrder`, `UserCounts`, `DailySummary`, `Segment`, `DateFilter`
//!
//! # Menu types
//!
//! An order is either `washoku` (Japanese cuisine) or `yoshoku` (Western cuisine).
//! The menu type travels through the log as an unvalidated string and is only
//! checked when the storage writer resolves it to a counter column.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod order;
pub mod summary;
pub mod wire;

pub use error::{OrderError, Result};
pub use ids::{FactId, IdError, UserId};
pub use order::{MenuType, OrderEvent};
pub use summary::{DailySummary, DateFilter, RawOrder, Segment, UserCounts};
pub use wire::{decode, encode, WIRE_VERSION};
