//! Core wire types and utilities for the `LedgerLens` realtime dashboard
//!
//! This crate defines the typed mirror of the messages the dashboard server
//! pushes over its WebSocket channels, the shared error type, and the small
//! risk/rate helpers the update sinks rely on.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod error;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
pub use types::{
    ActivityEntry, AlertStats, AnalyticsSnapshot, DashboardSnapshot, Envelope, Notification,
    RiskDistribution, Severity, TransactionStats, UploadProcessingStatus,
};
