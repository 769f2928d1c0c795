//! Wire types for the dashboard WebSocket channels
//!
//! Every message the server pushes is a JSON object tagged by a `type` field.
//! The payload shapes mirror what the server-side consumers emit; all of them
//! are full snapshots, so applying one is a plain replace on the client side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity levels, lowest to highest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, no action expected
    Low,
    /// Worth a look during normal review
    Medium,
    /// Needs attention soon
    High,
    /// Needs immediate attention
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Envelope for all channel messages, tagged by the `type` field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Per-user dashboard metrics snapshot
    #[serde(rename = "dashboard_update")]
    DashboardUpdate {
        /// Snapshot payload
        data: DashboardSnapshot,
        /// Server-side send time
        #[serde(with = "iso8601")]
        timestamp: DateTime<Utc>,
    },

    /// System-wide analytics snapshot
    #[serde(rename = "analytics_update")]
    AnalyticsUpdate {
        /// Snapshot payload
        data: AnalyticsSnapshot,
        /// Server-side send time
        #[serde(with = "iso8601")]
        timestamp: DateTime<Utc>,
    },

    /// Single user-facing notification
    #[serde(rename = "notification")]
    Notification {
        /// Notification payload
        data: Notification,
        /// Server-side send time
        #[serde(with = "iso8601")]
        timestamp: DateTime<Utc>,
    },

    /// Any tag this client does not understand
    #[serde(other)]
    Unknown,
}

impl Envelope {
    /// Decode one wire frame
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] when the frame is not valid
    /// JSON or a known tag carries a payload of the wrong shape.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw).map_err(crate::Error::from)
    }

    /// Wire tag of this message
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::DashboardUpdate { .. } => "dashboard_update",
            Self::AnalyticsUpdate { .. } => "analytics_update",
            Self::Notification { .. } => "notification",
            Self::Unknown => "unknown",
        }
    }
}

/// Per-user dashboard metrics over the trailing 30 days
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardSnapshot {
    /// Transaction counters
    pub transactions: TransactionStats,

    /// Alert counters
    pub alerts: AlertStats,

    /// Most recent audit log entries, newest first
    #[serde(default)]
    pub recent_activity: Vec<ActivityEntry>,

    /// When the server computed this snapshot
    #[serde(default, with = "iso8601::option")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Transaction counters within a dashboard snapshot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionStats {
    /// Transactions seen in the window
    pub total_count: u64,

    /// Transactions with a risk score at or above the high band
    pub high_risk_count: u64,

    /// Mean risk score across scored transactions
    pub avg_risk: f64,
}

/// Alert counters within a dashboard snapshot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AlertStats {
    /// Alerts opened in the window
    pub total_alerts: u64,

    /// Alerts marked resolved
    pub resolved_alerts: u64,

    /// Alerts at critical severity
    pub critical_alerts: u64,
}

/// One audit log line in the recent-activity feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    /// When the action happened
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,

    /// Action verb (create, update, delete, ...)
    pub action: String,

    /// Model the action touched
    pub model_name: String,

    /// Acting user, if attributable
    #[serde(rename = "user__username", default)]
    pub username: Option<String>,
}

/// System-wide analytics over the trailing 30 days
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSnapshot {
    /// All transactions in the window
    pub total_transactions: u64,

    /// Transactions in the high risk band
    pub high_risk_transactions: u64,

    /// Percentage of transactions that are high risk, one decimal
    pub risk_rate: f64,

    /// All alerts in the window
    pub total_alerts: u64,

    /// Alerts resolved in the window
    pub resolved_alerts: u64,

    /// Percentage of alerts resolved, one decimal
    pub resolution_rate: f64,

    /// Transactions bucketed by risk band
    pub risk_distribution: RiskDistribution,

    /// Ledger upload pipeline counters
    pub processing_status: UploadProcessingStatus,

    /// When the server computed this snapshot
    #[serde(default, with = "iso8601::option")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Transactions bucketed by risk band
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskDistribution {
    /// Risk score below 40
    pub low: u64,

    /// Risk score 40 to 69
    pub medium: u64,

    /// Risk score 70 and above
    pub high: u64,
}

/// Ledger upload pipeline counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadProcessingStatus {
    /// Uploads waiting to be processed
    pub pending: u64,

    /// Uploads currently processing
    pub processing: u64,

    /// Uploads processed successfully
    pub completed: u64,

    /// Uploads that failed processing
    pub error: u64,
}

/// A user-facing notification pushed on the notifications channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// Server-side identifier of the underlying record
    pub id: i64,

    /// Notification kind, currently always `alert`
    #[serde(rename = "type", default = "default_notification_kind")]
    pub kind: String,

    /// Short title
    pub title: String,

    /// Human-readable message body
    pub message: String,

    /// Severity of the underlying alert
    pub severity: Severity,

    /// When the underlying record was created
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,

    /// Link target for the notification, if any
    #[serde(default)]
    pub url: Option<String>,
}

fn default_notification_kind() -> String {
    "alert".to_string()
}

/// Lenient ISO 8601 timestamp (de)serialization
///
/// The server mixes timezone-aware and naive timestamps (`isoformat()` with
/// and without `tzinfo`); naive values are taken as UTC.
pub mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Parse an ISO 8601 string, treating naive timestamps as UTC
    ///
    /// # Errors
    ///
    /// Returns an error if the string is neither RFC 3339 nor a naive
    /// `YYYY-MM-DDTHH:MM:SS[.f]` timestamp.
    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
            })
    }

    /// Serde deserialize hook
    ///
    /// # Errors
    ///
    /// Returns a deserialization error for non-string or unparseable values.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(de::Error::custom)
    }

    /// Serde serialize hook
    ///
    /// # Errors
    ///
    /// Returns the serializer's error, if any.
    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    /// Lenient ISO 8601 for optional timestamps
    pub mod option {
        use super::{DateTime, Utc, de, parse};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serde deserialize hook for `Option<DateTime<Utc>>`
        ///
        /// # Errors
        ///
        /// Returns a deserialization error for unparseable values.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => parse(&s).map(Some).map_err(de::Error::custom),
                None => Ok(None),
            }
        }

        /// Serde serialize hook for `Option<DateTime<Utc>>`
        ///
        /// # Errors
        ///
        /// Returns the serializer's error, if any.
        pub fn serialize<S>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_display_and_serde() {
        assert_eq!(Severity::Critical.to_string(), "critical");
        assert_eq!(
            serde_json::to_string(&Severity::High).unwrap(),
            "\"high\""
        );
        let parsed: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
    }

    #[test]
    fn test_dashboard_update_decoding() {
        let raw = r#"{
            "type": "dashboard_update",
            "data": {
                "transactions": {"total_count": 120, "high_risk_count": 14, "avg_risk": 32.5},
                "alerts": {"total_alerts": 9, "resolved_alerts": 4, "critical_alerts": 1},
                "recent_activity": [
                    {
                        "timestamp": "2025-03-01T10:15:00+00:00",
                        "action": "update",
                        "model_name": "Transaction",
                        "user__username": "auditor1"
                    }
                ],
                "last_updated": "2025-03-01T10:15:30+00:00"
            },
            "timestamp": "2025-03-01T10:15:30.123456"
        }"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        match envelope {
            Envelope::DashboardUpdate { data, timestamp } => {
                assert_eq!(data.transactions.total_count, 120);
                assert_eq!(data.transactions.avg_risk, 32.5);
                assert_eq!(data.alerts.critical_alerts, 1);
                assert_eq!(data.recent_activity.len(), 1);
                assert_eq!(
                    data.recent_activity[0].username.as_deref(),
                    Some("auditor1")
                );
                assert!(data.last_updated.is_some());
                // Naive envelope timestamp is taken as UTC
                assert_eq!(timestamp.timezone(), Utc);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_analytics_update_decoding() {
        let raw = r#"{
            "type": "analytics_update",
            "data": {
                "total_transactions": 1000,
                "high_risk_transactions": 70,
                "risk_rate": 7.0,
                "total_alerts": 40,
                "resolved_alerts": 30,
                "resolution_rate": 75.0,
                "risk_distribution": {"low": 800, "medium": 130, "high": 70},
                "processing_status": {"pending": 2, "processing": 1, "completed": 55, "error": 3},
                "last_updated": "2025-03-01T10:00:00+00:00"
            },
            "timestamp": "2025-03-01T10:00:00+00:00"
        }"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        match envelope {
            Envelope::AnalyticsUpdate { data, .. } => {
                assert_eq!(data.risk_distribution.high, 70);
                assert_eq!(data.processing_status.completed, 55);
                assert_eq!(data.resolution_rate, 75.0);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_notification_decoding() {
        let raw = r#"{
            "type": "notification",
            "data": {
                "id": 42,
                "type": "alert",
                "title": "Large transfer flagged",
                "message": "New alert: Large transfer flagged",
                "severity": "critical",
                "created_at": "2025-03-01T09:59:00+00:00",
                "url": "/reviewer_dashboard/?alert=42"
            },
            "timestamp": "2025-03-01T09:59:01+00:00"
        }"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        match envelope {
            Envelope::Notification { data, .. } => {
                assert_eq!(data.id, 42);
                assert_eq!(data.kind, "alert");
                assert_eq!(data.severity, Severity::Critical);
                assert_eq!(data.url.as_deref(), Some("/reviewer_dashboard/?alert=42"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_from_json() {
        let envelope =
            Envelope::from_json(r#"{"type": "heartbeat"}"#).unwrap();
        assert_eq!(envelope, Envelope::Unknown);

        let error = Envelope::from_json("{not json").unwrap_err();
        assert!(matches!(error, crate::Error::Serialization(_)));
    }

    #[test]
    fn test_unknown_tag_is_tolerated() {
        let raw = r#"{"type": "heartbeat", "data": {}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope, Envelope::Unknown);
        assert_eq!(envelope.tag(), "unknown");
    }

    #[test]
    fn test_envelope_tags() {
        let envelope = Envelope::Notification {
            data: Notification {
                id: 1,
                kind: "alert".to_string(),
                title: "t".to_string(),
                message: "m".to_string(),
                severity: Severity::Low,
                created_at: Utc::now(),
                url: None,
            },
            timestamp: Utc::now(),
        };
        assert_eq!(envelope.tag(), "notification");
    }

    #[test]
    fn test_iso8601_parse_variants() {
        // Aware
        assert!(iso8601::parse("2025-03-01T10:00:00+00:00").is_ok());
        // Naive with fractional seconds
        assert!(iso8601::parse("2025-03-01T10:00:00.123456").is_ok());
        // Naive without fraction
        assert!(iso8601::parse("2025-03-01T10:00:00").is_ok());
        // Garbage
        assert!(iso8601::parse("not a timestamp").is_err());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope::AnalyticsUpdate {
            data: AnalyticsSnapshot::default(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"analytics_update\""));
        let decoded: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.tag(), "analytics_update");
    }

    #[test]
    fn test_missing_optional_fields() {
        // recent_activity and last_updated may be absent entirely
        let raw = r#"{
            "type": "dashboard_update",
            "data": {
                "transactions": {"total_count": 0, "high_risk_count": 0, "avg_risk": 0.0},
                "alerts": {"total_alerts": 0, "resolved_alerts": 0, "critical_alerts": 0}
            },
            "timestamp": "2025-03-01T10:00:00"
        }"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        match envelope {
            Envelope::DashboardUpdate { data, .. } => {
                assert!(data.recent_activity.is_empty());
                assert!(data.last_updated.is_none());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }
}
