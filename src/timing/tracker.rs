//! Cross-session timing tracker.
//!
//! Keyed by a caller-chosen session id (typically the client's self-reported
//! model name). Self-reported keys are advisory evidence only and must never
//! gate authentication on their own.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;

use super::{AnomalySeverity, AnomalyType, SessionAnomaly, TimingZone};

struct SessionEntry {
    elapsed_ms: f64,
    zone: TimingZone,
    timestamp_ms: i64,
}

/// Records per-solve timings and reports anomalies across a session.
#[derive(Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<String, Vec<SessionEntry>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        SessionTracker::default()
    }

    pub async fn record(&self, session_id: &str, elapsed_ms: f64, zone: TimingZone) {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_owned())
            .or_default()
            .push(SessionEntry {
                elapsed_ms,
                zone,
                timestamp_ms: Utc::now().timestamp_millis(),
            });
    }

    pub async fn analyze(&self, session_id: &str) -> Vec<SessionAnomaly> {
        let sessions = self.sessions.lock().await;
        let Some(entries) = sessions.get(session_id) else {
            return Vec::new();
        };
        if entries.len() < 2 {
            return Vec::new();
        }

        let mut anomalies = Vec::new();

        // Zone oscillation between machine-like and human-like latencies
        let ai_count = entries
            .iter()
            .filter(|e| e.zone == TimingZone::AiZone)
            .count();
        let human_count = entries
            .iter()
            .filter(|e| matches!(e.zone, TimingZone::Human | TimingZone::Suspicious))
            .count();
        if ai_count > 0 && human_count > 0 && entries.len() >= 3 {
            anomalies.push(SessionAnomaly {
                anomaly_type: AnomalyType::ZoneInconsistency,
                description: format!(
                    "Session oscillates between AI zone ({ai_count}x) and human/suspicious zone ({human_count}x) across {} challenges",
                    entries.len()
                ),
                severity: if human_count >= ai_count {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Medium
                },
            });
        }

        // Suspiciously stable latency
        if entries.len() >= 3 {
            let timings: Vec<f64> = entries.iter().map(|e| e.elapsed_ms).collect();
            let mean = timings.iter().sum::<f64>() / timings.len() as f64;
            if mean > 0.0 {
                let std = (timings.iter().map(|t| (t - mean).powi(2)).sum::<f64>()
                    / timings.len() as f64)
                    .sqrt();
                let cv = std / mean;
                if cv < 0.05 {
                    anomalies.push(SessionAnomaly {
                        anomaly_type: AnomalyType::TimingVarianceAnomaly,
                        description: format!(
                            "Timing variance coefficient {:.1}% is suspiciously low across {} challenges",
                            cv * 100.0,
                            entries.len()
                        ),
                        severity: AnomalySeverity::High,
                    });
                }
            }
        }

        // Back-to-back solves; reported once per analysis
        for i in 1..entries.len() {
            let gap = (entries[i].timestamp_ms - entries[i - 1].timestamp_ms) as f64;
            if gap < 5000.0 {
                anomalies.push(SessionAnomaly {
                    anomaly_type: AnomalyType::RapidSuccession,
                    description: format!(
                        "Challenges {} and {i} completed {gap:.0}ms apart (< 5000ms threshold)",
                        i - 1
                    ),
                    severity: if gap < 2000.0 {
                        AnomalySeverity::High
                    } else {
                        AnomalySeverity::Low
                    },
                });
                break;
            }
        }

        anomalies
    }

    pub async fn clear(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_entry_reports_nothing() {
        let tracker = SessionTracker::new();
        tracker.record("gpt-4", 500.0, TimingZone::AiZone).await;
        assert!(tracker.analyze("gpt-4").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_reports_nothing() {
        let tracker = SessionTracker::new();
        assert!(tracker.analyze("never-seen").await.is_empty());
    }

    #[tokio::test]
    async fn test_zone_inconsistency_detected() {
        let tracker = SessionTracker::new();
        tracker.record("m", 500.0, TimingZone::AiZone).await;
        tracker.record("m", 12000.0, TimingZone::Human).await;
        tracker.record("m", 700.0, TimingZone::AiZone).await;
        let anomalies = tracker.analyze("m").await;
        assert!(anomalies
            .iter()
            .any(|a| a.anomaly_type == AnomalyType::ZoneInconsistency));
    }

    #[tokio::test]
    async fn test_zone_inconsistency_needs_three_entries() {
        let tracker = SessionTracker::new();
        tracker.record("m", 500.0, TimingZone::AiZone).await;
        tracker.record("m", 12000.0, TimingZone::Human).await;
        let anomalies = tracker.analyze("m").await;
        assert!(!anomalies
            .iter()
            .any(|a| a.anomaly_type == AnomalyType::ZoneInconsistency));
    }

    #[tokio::test]
    async fn test_zone_inconsistency_severity() {
        let tracker = SessionTracker::new();
        tracker.record("m", 12000.0, TimingZone::Human).await;
        tracker.record("m", 11000.0, TimingZone::Suspicious).await;
        tracker.record("m", 700.0, TimingZone::AiZone).await;
        let anomalies = tracker.analyze("m").await;
        let anomaly = anomalies
            .iter()
            .find(|a| a.anomaly_type == AnomalyType::ZoneInconsistency)
            .unwrap();
        // human-like entries dominate
        assert_eq!(anomaly.severity, AnomalySeverity::High);
    }

    #[tokio::test]
    async fn test_low_variance_detected() {
        let tracker = SessionTracker::new();
        for _ in 0..4 {
            tracker.record("m", 1000.0, TimingZone::AiZone).await;
        }
        let anomalies = tracker.analyze("m").await;
        assert!(anomalies
            .iter()
            .any(|a| a.anomaly_type == AnomalyType::TimingVarianceAnomaly));
    }

    #[tokio::test]
    async fn test_varied_timings_no_variance_anomaly() {
        let tracker = SessionTracker::new();
        for t in [400.0, 900.0, 1700.0, 650.0] {
            tracker.record("m", t, TimingZone::AiZone).await;
        }
        let anomalies = tracker.analyze("m").await;
        assert!(!anomalies
            .iter()
            .any(|a| a.anomaly_type == AnomalyType::TimingVarianceAnomaly));
    }

    #[tokio::test]
    async fn test_rapid_succession_reported_once() {
        let tracker = SessionTracker::new();
        // recorded back-to-back, so the wall-clock gaps are well under 5s
        tracker.record("m", 600.0, TimingZone::AiZone).await;
        tracker.record("m", 610.0, TimingZone::AiZone).await;
        tracker.record("m", 620.0, TimingZone::AiZone).await;
        let anomalies = tracker.analyze("m").await;
        let rapid: Vec<_> = anomalies
            .iter()
            .filter(|a| a.anomaly_type == AnomalyType::RapidSuccession)
            .collect();
        assert_eq!(rapid.len(), 1);
        assert_eq!(rapid[0].severity, AnomalySeverity::High);
    }

    #[tokio::test]
    async fn test_clear_forgets_session() {
        let tracker = SessionTracker::new();
        tracker.record("m", 600.0, TimingZone::AiZone).await;
        tracker.record("m", 610.0, TimingZone::AiZone).await;
        tracker.clear("m").await;
        assert!(tracker.analyze("m").await.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let tracker = SessionTracker::new();
        tracker.record("a", 500.0, TimingZone::AiZone).await;
        tracker.record("a", 12000.0, TimingZone::Human).await;
        tracker.record("a", 700.0, TimingZone::AiZone).await;
        tracker.record("b", 500.0, TimingZone::AiZone).await;
        tracker.record("b", 650.0, TimingZone::AiZone).await;
        let b_anomalies = tracker.analyze("b").await;
        assert!(!b_anomalies
            .iter()
            .any(|a| a.anomaly_type == AnomalyType::ZoneInconsistency));
    }
}
