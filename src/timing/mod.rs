//! Timing analysis: latency zones, per-step pattern detection, and
//! cross-session anomaly tracking.

use serde::{Deserialize, Serialize};

use crate::types::Difficulty;

pub mod analyzer;
pub mod baselines;
pub mod tracker;

pub use analyzer::TimingAnalyzer;
pub use baselines::{default_baselines, get_baseline};
pub use tracker::SessionTracker;

/// Behavioural zone assigned from elapsed latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingZone {
    TooFast,
    AiZone,
    Suspicious,
    Human,
    Timeout,
}

/// Latency boundaries and mean/σ for one challenge type × difficulty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingBaseline {
    pub challenge_type: String,
    pub difficulty: Difficulty,
    pub mean_ms: f64,
    pub std_ms: f64,
    pub too_fast_ms: f64,
    pub ai_lower_ms: f64,
    pub ai_upper_ms: f64,
    pub human_ms: f64,
    pub timeout_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub elapsed_ms: f64,
    pub zone: TimingZone,
    pub confidence: f64,
    pub z_score: f64,
    pub penalty: f64,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Constant,
    Increasing,
    Decreasing,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternVerdict {
    Natural,
    Artificial,
    Inconclusive,
}

/// Analysis of client-reported per-step timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingPatternAnalysis {
    pub variance_coefficient: f64,
    pub trend: Trend,
    /// Fraction of step timings divisible by 100 ms or 500 ms.
    pub round_number_ratio: f64,
    pub verdict: PatternVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    ZoneInconsistency,
    TimingVarianceAnomaly,
    RapidSuccession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnomaly {
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub description: String,
    pub severity: AnomalySeverity,
}

/// Timing section of the engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Overrides the 16 built-in baselines when set.
    #[serde(default)]
    pub baselines: Option<Vec<TimingBaseline>>,
    #[serde(default)]
    pub default_too_fast_ms: Option<f64>,
    #[serde(default)]
    pub default_ai_lower_ms: Option<f64>,
    #[serde(default)]
    pub default_ai_upper_ms: Option<f64>,
    #[serde(default)]
    pub default_human_ms: Option<f64>,
    #[serde(default)]
    pub default_timeout_ms: Option<f64>,
    #[serde(default)]
    pub session_tracking: SessionTrackingConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SessionTrackingConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&TimingZone::TooFast).unwrap(),
            "\"too_fast\""
        );
        assert_eq!(
            serde_json::to_string(&TimingZone::AiZone).unwrap(),
            "\"ai_zone\""
        );
    }

    #[test]
    fn test_anomaly_type_field_renamed() {
        let anomaly = SessionAnomaly {
            anomaly_type: AnomalyType::RapidSuccession,
            description: "d".into(),
            severity: AnomalySeverity::High,
        };
        let json = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["type"], "rapid_succession");
        assert_eq!(json["severity"], "high");
    }

    #[test]
    fn test_timing_config_defaults() {
        let config: TimingConfig = toml::from_str("enabled = true").unwrap();
        assert!(config.enabled);
        assert!(config.baselines.is_none());
        assert!(!config.session_tracking.enabled);
    }
}
