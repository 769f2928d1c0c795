//! Configuration management for the realtime dispatcher

use crate::channel::ChannelKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for the realtime dispatcher service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Dashboard server connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-channel settings
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Reconnect policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Service behavior
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Dashboard server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket base URL of the dashboard server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User the dashboard and notifications channels are scoped to
    #[serde(default = "default_user_id")]
    pub user_id: i64,
}

/// Per-channel settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Per-user dashboard channel
    #[serde(default)]
    pub dashboard: ChannelConfig,

    /// System-wide analytics channel
    #[serde(default)]
    pub analytics: ChannelConfig,

    /// Per-user notifications channel
    #[serde(default)]
    pub notifications: ChannelConfig,
}

/// Settings for a single channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Whether this channel is connected at all
    #[serde(default = "default_channel_enabled")]
    pub enabled: bool,

    /// Full URL override; derived from the base URL when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Reconnect policy
///
/// The delay is fixed, not exponential: a dropped channel waits the same
/// interval before every attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay between reconnect attempts in seconds
    #[serde(default = "default_reconnect_delay")]
    pub delay_seconds: u64,

    /// Connect (handshake) timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Consecutive failed attempts before a channel gives up (0 = never)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Service behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Graceful shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,

    /// Enable periodic metrics logging
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,

    /// Metrics logging interval in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_seconds: u64,

    /// Most recent notifications kept in the feed
    #[serde(default = "default_notification_feed_limit")]
    pub notification_feed_limit: usize,
}

// Default value functions
fn default_base_url() -> String {
    "ws://127.0.0.1:8000".to_string()
}

const fn default_user_id() -> i64 {
    1
}

const fn default_channel_enabled() -> bool {
    true
}

const fn default_reconnect_delay() -> u64 {
    5
}

const fn default_connect_timeout() -> u64 {
    10
}

const fn default_max_attempts() -> u32 {
    0 // retry forever
}

fn default_service_name() -> String {
    "ledgerlens-realtime".to_string()
}

const fn default_shutdown_timeout() -> u64 {
    30
}

const fn default_enable_metrics() -> bool {
    true
}

const fn default_metrics_interval() -> u64 {
    60
}

const fn default_notification_feed_limit() -> usize {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_id: default_user_id(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: default_channel_enabled(),
            url: None,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_seconds: default_reconnect_delay(),
            connect_timeout_seconds: default_connect_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            enable_metrics: default_enable_metrics(),
            metrics_interval_seconds: default_metrics_interval(),
            notification_feed_limit: default_notification_feed_limit(),
        }
    }
}

impl ReconnectConfig {
    /// Get reconnect delay as Duration
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    /// Get connect timeout as Duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl ServiceConfig {
    /// Get shutdown timeout as Duration
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Get metrics interval as Duration
    #[must_use]
    pub const fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_seconds)
    }
}

/// Environment override source
///
/// The double-underscore separator keeps snake_case field names addressable
/// (a single underscore would split `delay_seconds` into `delay.seconds`).
fn environment_source() -> config::Environment {
    config::Environment::with_prefix("LEDGERLENS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl RealtimeConfig {
    /// Load configuration from files and environment
    ///
    /// Looks for `realtime.toml` / `config.toml` in the working directory and
    /// the platform config directory, then applies `LEDGERLENS_*` environment
    /// overrides. Sections and keys are separated by a double underscore, so
    /// `LEDGERLENS_RECONNECT__DELAY_SECONDS=2` overrides
    /// `reconnect.delay_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RealtimeError::Configuration`] if a source contains
    /// invalid syntax or values outside their valid ranges.
    pub fn load() -> crate::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("realtime").required(false))
            .add_source(config::File::with_name("config").required(false));

        if let Some(dirs) = directories::ProjectDirs::from("io", "ledgerlens", "ledgerlens") {
            let path = dirs.config_dir().join("realtime");
            builder = builder
                .add_source(config::File::from(path).required(false));
        }

        let config = builder
            .add_source(environment_source())
            .build()
            .map_err(|e| crate::RealtimeError::configuration(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| crate::RealtimeError::configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate invariants the serde defaults cannot express
    ///
    /// # Errors
    ///
    /// Returns [`crate::RealtimeError::Configuration`] if the base URL has a
    /// non-WebSocket scheme, every channel is disabled, or the reconnect
    /// delay is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.server.base_url.starts_with("ws://") && !self.server.base_url.starts_with("wss://")
        {
            return Err(crate::RealtimeError::configuration(format!(
                "base_url must use ws:// or wss://, got {}",
                self.server.base_url
            )));
        }

        if ChannelKind::all()
            .iter()
            .all(|kind| !self.channel(*kind).enabled)
        {
            return Err(crate::RealtimeError::configuration(
                "all channels are disabled",
            ));
        }

        if self.reconnect.delay_seconds == 0 {
            return Err(crate::RealtimeError::configuration(
                "reconnect delay must be at least one second",
            ));
        }

        Ok(())
    }

    /// Settings for one channel
    #[must_use]
    pub const fn channel(&self, kind: ChannelKind) -> &ChannelConfig {
        match kind {
            ChannelKind::Dashboard => &self.channels.dashboard,
            ChannelKind::Analytics => &self.channels.analytics,
            ChannelKind::Notifications => &self.channels.notifications,
        }
    }

    /// Resolved URL for one channel
    ///
    /// Uses the per-channel override when present, otherwise derives the URL
    /// from the base URL and the server's routing scheme.
    #[must_use]
    pub fn channel_url(&self, kind: ChannelKind) -> String {
        if let Some(url) = &self.channel(kind).url {
            return url.clone();
        }

        let base = self.server.base_url.trim_end_matches('/');
        match kind {
            ChannelKind::Dashboard => format!("{base}/ws/dashboard/{}/", self.server.user_id),
            ChannelKind::Analytics => format!("{base}/ws/analytics/"),
            ChannelKind::Notifications => {
                format!("{base}/ws/notifications/{}/", self.server.user_id)
            }
        }
    }

    /// Channels that are enabled in this configuration
    #[must_use]
    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        ChannelKind::all()
            .iter()
            .copied()
            .filter(|kind| self.channel(*kind).enabled)
            .collect()
    }
}
