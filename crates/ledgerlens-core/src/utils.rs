//! Small helpers shared by the update sinks

/// Risk bands used across the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    /// Score below 40
    Low,
    /// Score 40 to 69
    Medium,
    /// Score 70 and above
    High,
}

/// High-risk threshold on the 0-100 risk score scale
pub const HIGH_RISK_THRESHOLD: f64 = 70.0;

/// Medium-risk threshold on the 0-100 risk score scale
pub const MEDIUM_RISK_THRESHOLD: f64 = 40.0;

/// Classify a 0-100 risk score into its band
#[must_use]
pub fn risk_band(score: f64) -> RiskBand {
    if score >= HIGH_RISK_THRESHOLD {
        RiskBand::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskBand::Medium
    } else {
        RiskBand::Low
    }
}

/// Percentage of `part` in `total`, rounded to one decimal
///
/// Returns `0.0` for an empty total, matching the server-side guard.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rate_percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}
