//! Message routing from channel frames to the update sink
//!
//! Each typed message mutates one part of a shared view state: the metric
//! snapshots, the notification feed, or a channel's connection badge. The
//! message tag alone decides the route.

use crate::channel::{ChannelKind, ChannelRegistry, ChannelStatus};
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use ledgerlens_core::utils::rate_percent;
use ledgerlens_core::{AnalyticsSnapshot, DashboardSnapshot, Envelope, Notification, Severity};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receiver for routed channel updates
///
/// One method per kind of dashboard mutation: metric cards, analytics
/// charts, the notification feed, and the connection badge.
pub trait UpdateSink: Send + Sync + std::fmt::Debug {
    /// Replace the per-user dashboard snapshot
    fn apply_dashboard(&self, snapshot: DashboardSnapshot);

    /// Replace the system-wide analytics snapshot
    fn apply_analytics(&self, snapshot: AnalyticsSnapshot);

    /// Append a notification to the feed
    fn push_notification(&self, notification: Notification);

    /// Update a channel's connection badge
    fn channel_status(&self, kind: ChannelKind, status: ChannelStatus);
}

/// Default sink: the latest snapshots plus a bounded notification feed
///
/// Snapshot replaces are wait-free for readers; the feed keeps the most
/// recent entries, newest first.
#[derive(Debug)]
pub struct DashboardState {
    dashboard: ArcSwapOption<DashboardSnapshot>,
    analytics: ArcSwapOption<AnalyticsSnapshot>,
    notifications: RwLock<VecDeque<Notification>>,
    statuses: DashMap<ChannelKind, ChannelStatus>,
    feed_limit: usize,
}

impl DashboardState {
    /// Create a state holder keeping at most `feed_limit` notifications
    #[must_use]
    pub fn with_feed_limit(feed_limit: usize) -> Self {
        Self {
            dashboard: ArcSwapOption::empty(),
            analytics: ArcSwapOption::empty(),
            notifications: RwLock::new(VecDeque::with_capacity(feed_limit)),
            statuses: DashMap::new(),
            feed_limit,
        }
    }

    /// Latest dashboard snapshot, if one has arrived
    #[must_use]
    pub fn latest_dashboard(&self) -> Option<Arc<DashboardSnapshot>> {
        self.dashboard.load_full()
    }

    /// Latest analytics snapshot, if one has arrived
    #[must_use]
    pub fn latest_analytics(&self) -> Option<Arc<AnalyticsSnapshot>> {
        self.analytics.load_full()
    }

    /// Current notification feed, newest first
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().iter().cloned().collect()
    }

    /// Percentage of high-risk transactions in the latest dashboard
    /// snapshot, one decimal
    ///
    /// Returns `0.0` until a snapshot has arrived.
    #[must_use]
    pub fn high_risk_rate(&self) -> f64 {
        self.latest_dashboard().map_or(0.0, |snapshot| {
            rate_percent(
                snapshot.transactions.high_risk_count,
                snapshot.transactions.total_count,
            )
        })
    }

    /// Connection badge for a channel
    #[must_use]
    pub fn status(&self, kind: ChannelKind) -> ChannelStatus {
        self.statuses
            .get(&kind)
            .map_or(ChannelStatus::Disconnected, |entry| *entry.value())
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::with_feed_limit(50)
    }
}

impl UpdateSink for DashboardState {
    fn apply_dashboard(&self, snapshot: DashboardSnapshot) {
        debug!(
            total = snapshot.transactions.total_count,
            high_risk = snapshot.transactions.high_risk_count,
            "Applying dashboard snapshot"
        );
        self.dashboard.store(Some(Arc::new(snapshot)));
    }

    fn apply_analytics(&self, snapshot: AnalyticsSnapshot) {
        debug!(
            total = snapshot.total_transactions,
            risk_rate = snapshot.risk_rate,
            "Applying analytics snapshot"
        );
        self.analytics.store(Some(Arc::new(snapshot)));
    }

    fn push_notification(&self, notification: Notification) {
        if notification.severity >= Severity::High {
            info!(
                id = notification.id,
                severity = %notification.severity,
                title = %notification.title,
                "Notification received"
            );
        }

        let mut feed = self.notifications.write();
        feed.push_front(notification);
        feed.truncate(self.feed_limit);
    }

    fn channel_status(&self, kind: ChannelKind, status: ChannelStatus) {
        self.statuses.insert(kind, status);
    }
}

/// Routes raw text frames to the sink and keeps the channel registry current
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sink: Arc<dyn UpdateSink>,
    registry: Arc<ChannelRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over a sink and a stats registry
    #[must_use]
    pub const fn new(sink: Arc<dyn UpdateSink>, registry: Arc<ChannelRegistry>) -> Self {
        Self { sink, registry }
    }

    /// The sink this dispatcher feeds
    #[must_use]
    pub fn sink(&self) -> Arc<dyn UpdateSink> {
        self.sink.clone()
    }

    /// Handle one text frame from a channel
    ///
    /// Malformed JSON and unknown tags are counted and logged, never fatal:
    /// a bad frame must not take the channel down.
    pub fn dispatch_text(&self, kind: ChannelKind, text: &str) {
        self.registry.record_message(kind);

        let envelope = match Envelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(channel = %kind, error = %e, "Failed to parse frame");
                self.registry.record_parse_failure(kind);
                return;
            }
        };

        match envelope {
            Envelope::DashboardUpdate { data, .. } => {
                self.sink.apply_dashboard(data);
                self.registry.record_dispatched(kind);
            }
            Envelope::AnalyticsUpdate { data, .. } => {
                self.sink.apply_analytics(data);
                self.registry.record_dispatched(kind);
            }
            Envelope::Notification { data, .. } => {
                self.sink.push_notification(data);
                self.registry.record_dispatched(kind);
            }
            Envelope::Unknown => {
                warn!(channel = %kind, "Ignoring frame with unknown type tag");
                self.registry.record_parse_failure(kind);
            }
        }
    }

    /// Forward a connection status change to the sink
    pub fn status_changed(&self, kind: ChannelKind, status: ChannelStatus) {
        self.sink.channel_status(kind, status);
    }
}
