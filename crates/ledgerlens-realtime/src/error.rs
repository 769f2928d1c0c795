//! Error types for the realtime dispatcher

use std::{error::Error as StdError, fmt};
use tokio_tungstenite::tungstenite;

/// Result type alias for realtime operations
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur while running the realtime dispatcher
#[derive(Debug)]
pub enum RealtimeError {
    /// Failed to establish or hold a channel connection
    Connection {
        /// Channel the connection belongs to
        channel: String,
        /// Error message
        message: String,
    },

    /// Failed to parse an incoming frame
    Parse {
        /// Channel the frame arrived on
        channel: String,
        /// Error message
        message: String,
    },

    /// WebSocket protocol error
    WebSocket(tungstenite::Error),

    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Configuration {
        /// Error message
        message: String,
    },

    /// Service not running
    ServiceNotRunning,

    /// Service already running
    ServiceAlreadyRunning,

    /// Timeout error
    Timeout {
        /// Operation that timed out
        operation: String,
    },

    /// Shutdown error
    Shutdown {
        /// Error message
        message: String,
    },
}

impl RealtimeError {
    /// Create a new connection error
    #[must_use]
    pub fn connection<C: fmt::Display, S: Into<String>>(channel: C, message: S) -> Self {
        Self::Connection {
            channel: channel.to_string(),
            message: message.into(),
        }
    }

    /// Create a new parse error
    #[must_use]
    pub fn parse<C: fmt::Display, S: Into<String>>(channel: C, message: S) -> Self {
        Self::Parse {
            channel: channel.to_string(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    #[must_use]
    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a new shutdown error
    #[must_use]
    pub fn shutdown<S: Into<String>>(message: S) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }
}

impl fmt::Display for RealtimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { channel, message } => {
                write!(f, "Connection error on {channel} channel: {message}")
            }
            Self::Parse { channel, message } => {
                write!(f, "Parse error on {channel} channel: {message}")
            }
            Self::WebSocket(err) => write!(f, "WebSocket error: {err}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Configuration { message } => write!(f, "Configuration error: {message}"),
            Self::ServiceNotRunning => write!(f, "Realtime service is not running"),
            Self::ServiceAlreadyRunning => write!(f, "Realtime service is already running"),
            Self::Timeout { operation } => write!(f, "Operation timed out: {operation}"),
            Self::Shutdown { message } => write!(f, "Shutdown error: {message}"),
        }
    }
}

impl StdError for RealtimeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::WebSocket(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// From implementations for automatic conversions
impl From<tungstenite::Error> for RealtimeError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(err)
    }
}

impl From<std::io::Error> for RealtimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
