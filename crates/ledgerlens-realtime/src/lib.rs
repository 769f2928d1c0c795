//! Realtime update dispatcher for the `LedgerLens` dashboard
//!
//! This crate maintains one WebSocket connection per server channel
//! (dashboard, analytics, notifications), reconnects on a fixed timer when a
//! session drops, and routes typed JSON messages into a shared update sink.
//! The service is designed to be resilient to errors and provides
//! comprehensive logging.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod channel;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod service;

// Re-export commonly used types
pub use channel::{ChannelKind, ChannelRegistry, ChannelStats, ChannelStatus};
pub use config::{ChannelsConfig, RealtimeConfig, ReconnectConfig, ServerConfig, ServiceConfig};
pub use dispatch::{DashboardState, Dispatcher, UpdateSink};
pub use error::{RealtimeError, Result};
pub use service::{RealtimeService, ServiceMetrics, ServiceStatus};

use std::sync::Arc;

/// Initialize the dispatcher service with configuration loaded from files
/// and environment
///
/// The default [`DashboardState`] sink is used; callers that render updates
/// themselves should construct [`RealtimeService`] with their own sink.
///
/// # Errors
///
/// Returns [`RealtimeError`] if:
/// - Configuration loading fails
/// - The loaded configuration is invalid
pub fn init() -> Result<RealtimeService> {
    let config = RealtimeConfig::load()?;
    let sink = Arc::new(DashboardState::with_feed_limit(
        config.service.notification_feed_limit,
    ));
    RealtimeService::new(config, sink)
}

/// Initialize the dispatcher service with custom configuration
///
/// # Errors
///
/// Returns [`RealtimeError`] if the configuration is invalid.
pub fn init_with_config(config: RealtimeConfig) -> Result<RealtimeService> {
    let sink = Arc::new(DashboardState::with_feed_limit(
        config.service.notification_feed_limit,
    ));
    RealtimeService::new(config, sink)
}
