//! Realtime dispatcher service
//!
//! Owns one connection task per enabled channel, aggregates their statistics,
//! and coordinates graceful shutdown.

use crate::channel::{ChannelKind, ChannelRegistry, ChannelStats};
use crate::config::RealtimeConfig;
use crate::connection::ChannelConnection;
use crate::dispatch::{Dispatcher, UpdateSink};
use crate::{RealtimeError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::{
    sync::{Notify, broadcast},
    task::JoinHandle,
    time::{Instant, interval},
};
use tracing::{debug, info, warn};

/// Task handles type alias
type TaskHandles = Arc<RwLock<Vec<JoinHandle<()>>>>;

/// Service status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    /// Service is stopped
    #[default]
    Stopped,

    /// Service is starting up
    Starting,

    /// Service is running normally
    Running,

    /// Every channel is currently disconnected
    Degraded {
        /// Reason for degraded status
        reason: String,
    },

    /// Service is shutting down
    Stopping,

    /// Every channel exhausted its reconnect budget and gave up
    Failed {
        /// Reason for failed status
        reason: String,
    },
}

/// Aggregated service metrics
#[derive(Debug, Clone, Default)]
pub struct ServiceMetrics {
    /// Frames received across all channels
    pub messages_received: u64,

    /// Messages routed to the sink
    pub messages_dispatched: u64,

    /// Frames that failed to parse or carried unknown tags
    pub parse_failures: u64,

    /// Successful reconnects across all channels
    pub reconnects: u64,

    /// Service uptime in seconds
    pub uptime_seconds: u64,

    /// Current service status
    pub status: ServiceStatus,
}

/// The realtime dispatcher service
#[derive(Debug)]
pub struct RealtimeService {
    /// Service configuration
    config: RealtimeConfig,

    /// Message router shared by all connection tasks
    dispatcher: Dispatcher,

    /// Per-channel statistics
    registry: Arc<ChannelRegistry>,

    /// Running task handles
    task_handles: TaskHandles,

    /// Shutdown signal for wait_for_shutdown
    shutdown_notify: Arc<Notify>,

    /// Shutdown sender (for broadcasting shutdown)
    shutdown_tx: broadcast::Sender<()>,

    /// Service status
    status: Arc<RwLock<ServiceStatus>>,

    /// Service start time
    start_time: Arc<RwLock<Option<Instant>>>,
}

impl RealtimeService {
    /// Create a new service over the given sink
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Configuration`] if the configuration is
    /// invalid.
    pub fn new(config: RealtimeConfig, sink: Arc<dyn UpdateSink>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ChannelRegistry::new());
        let dispatcher = Dispatcher::new(sink, registry.clone());
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            dispatcher,
            registry,
            task_handles: Arc::new(RwLock::new(Vec::new())),
            shutdown_notify: Arc::new(Notify::new()),
            shutdown_tx,
            status: Arc::new(RwLock::new(ServiceStatus::Stopped)),
            start_time: Arc::new(RwLock::new(None)),
        })
    }

    /// Start one connection task per enabled channel
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ServiceAlreadyRunning`] on double start.
    pub fn start(&self) -> Result<()> {
        {
            let mut status = self.status.write();
            if *status != ServiceStatus::Stopped {
                return Err(RealtimeError::ServiceAlreadyRunning);
            }
            *status = ServiceStatus::Starting;
        }

        info!(service = %self.config.service.name, "Starting realtime dispatcher");

        *self.start_time.write() = Some(Instant::now());

        let channels = self.config.enabled_channels();
        let mut handles = self.task_handles.write();
        for kind in &channels {
            handles.push(self.spawn_channel_task(*kind));
        }

        if self.config.service.enable_metrics {
            handles.push(self.spawn_metrics_task());
        }
        drop(handles);

        *self.status.write() = ServiceStatus::Running;

        info!(
            channels = channels.len(),
            reconnect_delay_s = self.config.reconnect.delay_seconds,
            "Realtime dispatcher started"
        );

        Ok(())
    }

    /// Stop the service, joining tasks under the shutdown timeout
    pub async fn stop(&self) {
        {
            let mut status = self.status.write();
            if *status == ServiceStatus::Stopped {
                return;
            }
            *status = ServiceStatus::Stopping;
        }

        info!("Stopping realtime dispatcher");

        let _ = self.shutdown_tx.send(());
        self.shutdown_notify.notify_waiters();

        let handles: Vec<_> = {
            let mut h = self.task_handles.write();
            h.drain(..).collect()
        };

        let shutdown_result = tokio::time::timeout(
            self.config.service.shutdown_timeout(),
            async {
                for handle in handles {
                    let _ = handle.await;
                }
            },
        )
        .await;

        if shutdown_result.is_err() {
            warn!("Shutdown timed out, some tasks may still be running");
        }

        *self.status.write() = ServiceStatus::Stopped;
        *self.start_time.write() = None;

        info!("Realtime dispatcher stopped");
    }

    /// Current service status
    ///
    /// Reports `Degraded` while the service is running with every channel
    /// disconnected at once, and `Failed` once every enabled channel has
    /// exhausted its reconnect budget.
    #[must_use]
    pub fn status(&self) -> ServiceStatus {
        let status = self.status.read().clone();
        if status == ServiceStatus::Running {
            let enabled = self.config.enabled_channels();
            if enabled
                .iter()
                .all(|kind| self.registry.snapshot(*kind).failed)
            {
                return ServiceStatus::Failed {
                    reason: "all channels exhausted their reconnect budget".to_string(),
                };
            }
            if self.registry.all_disconnected() {
                return ServiceStatus::Degraded {
                    reason: "all channels disconnected".to_string(),
                };
            }
        }
        status
    }

    /// Aggregated service metrics
    #[must_use]
    pub fn metrics(&self) -> ServiceMetrics {
        let totals = self.registry.totals();
        let uptime_seconds = self
            .start_time
            .read()
            .map_or(0, |start| start.elapsed().as_secs());

        ServiceMetrics {
            messages_received: totals.messages_received,
            messages_dispatched: totals.dispatched,
            parse_failures: totals.parse_failures,
            reconnects: totals.reconnects,
            uptime_seconds,
            status: self.status(),
        }
    }

    /// Statistics for one channel
    #[must_use]
    pub fn channel_stats(&self, kind: ChannelKind) -> ChannelStats {
        self.registry.snapshot(kind)
    }

    /// The sink the dispatcher feeds
    #[must_use]
    pub fn sink(&self) -> Arc<dyn UpdateSink> {
        self.dispatcher.sink()
    }

    /// Wait for shutdown signal
    pub async fn wait_for_shutdown(&self) {
        self.shutdown_notify.notified().await;
    }

    /// Spawn the connection task for one channel
    fn spawn_channel_task(&self, kind: ChannelKind) -> JoinHandle<()> {
        let connection = ChannelConnection::new(
            kind,
            self.config.channel_url(kind),
            self.config.reconnect.clone(),
            self.dispatcher.clone(),
            self.registry.clone(),
        );
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(connection.run(shutdown_rx))
    }

    /// Spawn the periodic metrics logging task
    fn spawn_metrics_task(&self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let metrics_interval = self.config.service.metrics_interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = interval(metrics_interval);
            // The first tick fires immediately; skip it
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let totals = registry.totals();
                        info!(
                            messages_received = totals.messages_received,
                            dispatched = totals.dispatched,
                            parse_failures = totals.parse_failures,
                            reconnects = totals.reconnects,
                            connected = totals.connected,
                            "Dispatcher metrics"
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Metrics task shutting down");
                        break;
                    }
                }
            }
        })
    }
}

impl Drop for RealtimeService {
    fn drop(&mut self) {
        // Ensure tasks get the signal when the service is dropped while running
        if !matches!(*self.status.read(), ServiceStatus::Stopped) {
            warn!("RealtimeService dropped while still running");
            let _ = self.shutdown_tx.send(());
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dispatch::DashboardState;
    use pretty_assertions::assert_eq;

    fn unreachable_config() -> RealtimeConfig {
        let mut config = RealtimeConfig::default();
        // Nothing listens on the discard port
        config.server.base_url = "ws://127.0.0.1:9".to_string();
        config.reconnect.delay_seconds = 1;
        config.reconnect.connect_timeout_seconds = 1;
        config.service.shutdown_timeout_seconds = 5;
        config
    }

    fn service(config: RealtimeConfig) -> RealtimeService {
        let sink = Arc::new(DashboardState::default());
        RealtimeService::new(config, sink).expect("valid config")
    }

    #[test]
    fn test_service_status_default() {
        assert_eq!(ServiceStatus::default(), ServiceStatus::Stopped);
    }

    #[test]
    fn test_service_metrics_default() {
        let metrics = ServiceMetrics::default();
        assert_eq!(metrics.messages_received, 0);
        assert_eq!(metrics.messages_dispatched, 0);
        assert_eq!(metrics.parse_failures, 0);
        assert_eq!(metrics.reconnects, 0);
        assert_eq!(metrics.uptime_seconds, 0);
        assert_eq!(metrics.status, ServiceStatus::Stopped);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = RealtimeConfig::default();
        config.server.base_url = "http://example.org".to_string();

        let sink = Arc::new(DashboardState::default());
        assert!(RealtimeService::new(config, sink).is_err());
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let service = service(unreachable_config());

        service.start().unwrap();
        let second = service.start();
        assert!(matches!(second, Err(RealtimeError::ServiceAlreadyRunning)));

        service.stop().await;
        assert_eq!(service.status(), ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_a_noop() {
        let service = service(unreachable_config());
        service.stop().await;
        assert_eq!(service.status(), ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let service = service(unreachable_config());

        service.start().unwrap();
        service.stop().await;

        // A stopped service can start again
        service.start().unwrap();
        service.stop().await;
    }

    #[tokio::test]
    async fn test_degraded_while_nothing_connected() {
        let service = service(unreachable_config());
        service.start().unwrap();

        // No server is listening, so every channel is disconnected
        match service.status() {
            ServiceStatus::Degraded { reason } => {
                assert!(reason.contains("disconnected"));
            }
            other => panic!("expected degraded, got {other:?}"),
        }

        service.stop().await;
    }

    #[tokio::test]
    async fn test_failed_when_all_budgets_exhausted() {
        let mut config = unreachable_config();
        config.reconnect.max_attempts = 1;
        config.service.enable_metrics = false;

        let service = service(config);
        service.start().unwrap();

        // Each channel gets one refused attempt and then gives up
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            if matches!(service.status(), ServiceStatus::Failed { .. }) {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "service should report failed, got {:?}",
                service.status()
            );
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        service.stop().await;
        assert_eq!(service.status(), ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_metrics_aggregate_registry() {
        let service = service(unreachable_config());

        service.registry.record_message(ChannelKind::Dashboard);
        service.registry.record_message(ChannelKind::Analytics);
        service.registry.record_dispatched(ChannelKind::Dashboard);
        service
            .registry
            .record_parse_failure(ChannelKind::Notifications);

        let metrics = service.metrics();
        assert_eq!(metrics.messages_received, 2);
        assert_eq!(metrics.messages_dispatched, 1);
        assert_eq!(metrics.parse_failures, 1);
        assert_eq!(metrics.status, ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_disabled_channels_are_not_spawned() {
        let mut config = unreachable_config();
        config.channels.analytics.enabled = false;
        config.channels.notifications.enabled = false;
        config.service.enable_metrics = false;

        let service = service(config);
        service.start().unwrap();
        assert_eq!(service.task_handles.read().len(), 1);
        service.stop().await;
    }
}
