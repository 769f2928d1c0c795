//! Channel identities and per-channel statistics

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// The three independent WebSocket channels the dashboard consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Per-user dashboard metrics
    Dashboard,

    /// System-wide analytics
    Analytics,

    /// Per-user notifications
    Notifications,
}

impl ChannelKind {
    /// All channels, in connection order
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Dashboard, Self::Analytics, Self::Notifications]
    }

    /// Stable name used in logs and config keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Analytics => "analytics",
            Self::Notifications => "notifications",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state of a channel, as reported to the update sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Handshake in progress
    Connecting,

    /// Connected and reading
    Connected,

    /// Session ended; a reconnect is pending
    Disconnected,

    /// Gave up after exhausting the reconnect budget
    Failed,
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Counters for a single channel
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    /// Successful connections, including the first
    pub connects: u64,

    /// Successful connections after a drop
    pub reconnects: u64,

    /// Frames received, parseable or not
    pub messages_received: u64,

    /// Frames that failed to parse or carried an unknown tag
    pub parse_failures: u64,

    /// Messages routed to the sink
    pub dispatched: u64,

    /// Whether the channel is connected right now
    pub connected: bool,

    /// Whether the channel exhausted its reconnect budget and gave up
    pub failed: bool,

    /// Last successful connection time
    pub last_connected_at: Option<DateTime<Utc>>,

    /// Last frame arrival time
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Shared registry of per-channel statistics
///
/// This is the only state shared between connection tasks besides the sink.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    stats: DashMap<ChannelKind, ChannelStats>,
}

impl ChannelRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful connection
    pub fn record_connected(&self, kind: ChannelKind) {
        let mut entry = self.stats.entry(kind).or_default();
        if entry.connects > 0 {
            entry.reconnects += 1;
        }
        entry.connects += 1;
        entry.connected = true;
        entry.failed = false;
        entry.last_connected_at = Some(Utc::now());
    }

    /// Record a channel giving up after exhausting its reconnect budget
    pub fn record_failed(&self, kind: ChannelKind) {
        let mut entry = self.stats.entry(kind).or_default();
        entry.connected = false;
        entry.failed = true;
    }

    /// Record a session ending
    pub fn record_disconnected(&self, kind: ChannelKind) {
        let mut entry = self.stats.entry(kind).or_default();
        entry.connected = false;
    }

    /// Record an incoming frame
    pub fn record_message(&self, kind: ChannelKind) {
        let mut entry = self.stats.entry(kind).or_default();
        entry.messages_received += 1;
        entry.last_message_at = Some(Utc::now());
    }

    /// Record a frame that could not be routed
    pub fn record_parse_failure(&self, kind: ChannelKind) {
        self.stats.entry(kind).or_default().parse_failures += 1;
    }

    /// Record a message handed to the sink
    pub fn record_dispatched(&self, kind: ChannelKind) {
        self.stats.entry(kind).or_default().dispatched += 1;
    }

    /// Snapshot of one channel's counters
    #[must_use]
    pub fn snapshot(&self, kind: ChannelKind) -> ChannelStats {
        self.stats
            .get(&kind)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// True when no channel currently holds a connection
    #[must_use]
    pub fn all_disconnected(&self) -> bool {
        ChannelKind::all()
            .iter()
            .all(|kind| !self.snapshot(*kind).connected)
    }

    /// Counters summed across all channels
    #[must_use]
    pub fn totals(&self) -> ChannelStats {
        let mut total = ChannelStats::default();
        for kind in ChannelKind::all() {
            let stats = self.snapshot(kind);
            total.connects += stats.connects;
            total.reconnects += stats.reconnects;
            total.messages_received += stats.messages_received;
            total.parse_failures += stats.parse_failures;
            total.dispatched += stats.dispatched;
            total.connected = total.connected || stats.connected;
        }
        total
    }
}
