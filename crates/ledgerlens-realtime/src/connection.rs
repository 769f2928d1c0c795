//! Per-channel WebSocket connection lifecycle
//!
//! Each channel runs one of these tasks: connect, read until the session
//! ends, wait the fixed reconnect delay, connect again. Channels never talk
//! to each other; one failing leaves the others untouched.

use crate::channel::{ChannelKind, ChannelRegistry, ChannelStatus};
use crate::config::ReconnectConfig;
use crate::dispatch::Dispatcher;
use crate::{RealtimeError, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Why a connected session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Server closed the connection or the stream drained
    Closed,

    /// Transport-level read or write error
    TransportError,

    /// Service shutdown requested
    Shutdown,
}

/// Connection task for a single channel
#[derive(Debug)]
pub struct ChannelConnection {
    kind: ChannelKind,
    url: String,
    reconnect: ReconnectConfig,
    dispatcher: Dispatcher,
    registry: Arc<ChannelRegistry>,
}

impl ChannelConnection {
    /// Create a connection task for `kind` against `url`
    #[must_use]
    pub const fn new(
        kind: ChannelKind,
        url: String,
        reconnect: ReconnectConfig,
        dispatcher: Dispatcher,
        registry: Arc<ChannelRegistry>,
    ) -> Self {
        Self {
            kind,
            url,
            reconnect,
            dispatcher,
            registry,
        }
    }

    /// Run the connect/read/reconnect loop until shutdown
    ///
    /// The reconnect delay is fixed; `max_attempts` consecutive *connect*
    /// failures (when non-zero) end the task with a `Failed` badge. A
    /// session that reached `Connected` resets the counter, so a clean
    /// server-side drop never consumes the budget.
    #[allow(clippy::cognitive_complexity)]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut attempts: u32 = 0;

        loop {
            self.dispatcher
                .status_changed(self.kind, ChannelStatus::Connecting);

            let connect = timeout(self.reconnect.connect_timeout(), connect_async(&self.url));
            let outcome = tokio::select! {
                outcome = connect => outcome,
                _ = shutdown_rx.recv() => {
                    debug!(channel = %self.kind, "Shutdown during connect");
                    return;
                }
            };

            match outcome {
                Ok(Ok((stream, _response))) => {
                    attempts = 0;
                    let session_id = Uuid::new_v4();
                    self.registry.record_connected(self.kind);
                    self.dispatcher
                        .status_changed(self.kind, ChannelStatus::Connected);
                    info!(
                        channel = %self.kind,
                        session_id = %session_id,
                        url = %self.url,
                        "Channel connected"
                    );

                    let reason = self.read_session(stream, &mut shutdown_rx).await;

                    self.registry.record_disconnected(self.kind);
                    self.dispatcher
                        .status_changed(self.kind, ChannelStatus::Disconnected);

                    if reason == SessionEnd::Shutdown {
                        debug!(channel = %self.kind, session_id = %session_id, "Session closed by shutdown");
                        return;
                    }
                    info!(
                        channel = %self.kind,
                        session_id = %session_id,
                        reason = ?reason,
                        "Session ended, will reconnect"
                    );
                }
                Ok(Err(e)) => {
                    warn!(channel = %self.kind, error = %e, "Connection failed");
                    attempts += 1;
                    if self.budget_exhausted(attempts) {
                        return;
                    }
                }
                Err(_elapsed) => {
                    warn!(
                        channel = %self.kind,
                        timeout_s = self.reconnect.connect_timeout_seconds,
                        "Connection attempt timed out"
                    );
                    attempts += 1;
                    if self.budget_exhausted(attempts) {
                        return;
                    }
                }
            }

            // Fixed delay, interruptible by shutdown
            tokio::select! {
                () = sleep(self.reconnect.delay()) => {}
                _ = shutdown_rx.recv() => {
                    debug!(channel = %self.kind, "Shutdown during reconnect wait");
                    return;
                }
            }
        }
    }

    /// True once a non-zero budget is used up; marks the channel failed
    fn budget_exhausted(&self, attempts: u32) -> bool {
        if self.reconnect.max_attempts == 0 || attempts < self.reconnect.max_attempts {
            return false;
        }
        error!(
            channel = %self.kind,
            attempts,
            "Reconnect budget exhausted, giving up"
        );
        self.registry.record_failed(self.kind);
        self.dispatcher
            .status_changed(self.kind, ChannelStatus::Failed);
        true
    }

    /// Read frames until the session ends for any reason
    async fn read_session<S>(
        &self,
        stream: tokio_tungstenite::WebSocketStream<S>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SessionEnd
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.dispatcher.dispatch_text(self.kind, &text);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            warn!(channel = %self.kind, error = %e, "Failed to answer ping");
                            return SessionEnd::TransportError;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(channel = %self.kind, frame = ?frame, "Server closed connection");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong and raw frames carry nothing for us
                    }
                    Some(Err(e)) => {
                        warn!(channel = %self.kind, error = %e, "Read error");
                        return SessionEnd::TransportError;
                    }
                    None => return SessionEnd::Closed,
                },
                _ = shutdown_rx.recv() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            }
        }
    }
}

/// Connect once to `url` and close immediately
///
/// Used by the CLI probe command to report channel reachability.
///
/// # Errors
///
/// Returns [`RealtimeError`] if the handshake fails or times out.
pub async fn probe(kind: ChannelKind, url: &str, connect_timeout: Duration) -> Result<()> {
    let (mut stream, _response) = timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| RealtimeError::timeout(format!("connect to {kind} channel")))?
        .map_err(|e| RealtimeError::connection(kind, e.to_string()))?;

    stream.close(None).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dispatch::DashboardState;

    fn connection(url: &str, max_attempts: u32) -> ChannelConnection {
        let state = Arc::new(DashboardState::default());
        let registry = Arc::new(ChannelRegistry::new());
        let dispatcher = Dispatcher::new(state, registry.clone());
        ChannelConnection::new(
            ChannelKind::Dashboard,
            url.to_string(),
            ReconnectConfig {
                delay_seconds: 1,
                connect_timeout_seconds: 1,
                max_attempts,
            },
            dispatcher,
            registry,
        )
    }

    #[tokio::test]
    async fn test_run_gives_up_after_budget() {
        // Port 9 on localhost should refuse quickly; one attempt allowed.
        let conn = connection("ws://127.0.0.1:9/ws/dashboard/1/", 1);
        let (_tx, rx) = broadcast::channel(1);

        // Must return rather than loop forever
        timeout(Duration::from_secs(10), conn.run(rx))
            .await
            .expect("run should give up within the budget");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_while_waiting() {
        let state = Arc::new(DashboardState::default());
        let registry = Arc::new(ChannelRegistry::new());
        let dispatcher = Dispatcher::new(state.clone(), registry.clone());
        let conn = ChannelConnection::new(
            ChannelKind::Analytics,
            "ws://127.0.0.1:9/ws/analytics/".to_string(),
            ReconnectConfig {
                delay_seconds: 60,
                connect_timeout_seconds: 1,
                max_attempts: 0,
            },
            dispatcher,
            registry,
        );

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(conn.run(rx));

        // Let the first attempt fail and the task park in the delay
        sleep(Duration::from_millis(300)).await;
        tx.send(()).unwrap();

        timeout(Duration::from_secs(5), handle)
            .await
            .expect("run should stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let result = probe(
            ChannelKind::Notifications,
            "ws://127.0.0.1:9/ws/notifications/1/",
            Duration::from_secs(2),
        )
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_session_end_equality() {
        assert_eq!(SessionEnd::Closed, SessionEnd::Closed);
        assert_ne!(SessionEnd::Closed, SessionEnd::Shutdown);
    }
}
