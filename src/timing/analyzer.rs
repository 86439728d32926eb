//! Latency zone classification and per-step pattern detection.

use std::collections::HashMap;

use super::baselines::default_baselines;
use super::{
    PatternVerdict, TimingAnalysis, TimingBaseline, TimingConfig, TimingPatternAnalysis,
    TimingZone, Trend,
};
use crate::types::{round2, round3, Difficulty};

struct DefaultBounds {
    too_fast: f64,
    ai_lower: f64,
    ai_upper: f64,
    human: f64,
    timeout: f64,
}

/// Classifies elapsed response times against per-(type, difficulty)
/// baselines.
pub struct TimingAnalyzer {
    baselines: HashMap<(String, Difficulty), TimingBaseline>,
    defaults: DefaultBounds,
}

impl TimingAnalyzer {
    pub fn new(config: &TimingConfig) -> Self {
        let all = config
            .baselines
            .clone()
            .unwrap_or_else(default_baselines);
        let baselines = all
            .into_iter()
            .map(|b| ((b.challenge_type.clone(), b.difficulty), b))
            .collect();

        TimingAnalyzer {
            baselines,
            defaults: DefaultBounds {
                too_fast: config.default_too_fast_ms.unwrap_or(50.0),
                ai_lower: config.default_ai_lower_ms.unwrap_or(50.0),
                ai_upper: config.default_ai_upper_ms.unwrap_or(2000.0),
                human: config.default_human_ms.unwrap_or(10000.0),
                timeout: config.default_timeout_ms.unwrap_or(30000.0),
            },
        }
    }

    pub fn analyze(
        &self,
        elapsed_ms: f64,
        challenge_type: &str,
        difficulty: Difficulty,
        rtt_ms: Option<f64>,
    ) -> TimingAnalysis {
        let baseline = self
            .baselines
            .get(&(challenge_type.to_owned(), difficulty))
            .cloned()
            .unwrap_or_else(|| self.default_baseline());

        // Widen the AI/human bounds to absorb network jitter when the
        // client reported a round-trip time.
        let tolerance = match rtt_ms {
            Some(rtt) if rtt > 0.0 => (rtt * 0.5).max(200.0),
            _ => 0.0,
        };
        let adjusted = TimingBaseline {
            ai_upper_ms: baseline.ai_upper_ms + tolerance,
            human_ms: baseline.human_ms + tolerance,
            ..baseline.clone()
        };

        let zone = classify_zone(elapsed_ms, &adjusted);
        let penalty = compute_penalty(zone, elapsed_ms, &adjusted);
        let z_score = compute_z_score(elapsed_ms, &baseline);
        let mut confidence = compute_confidence(elapsed_ms, &adjusted, zone);
        let mut details = describe_zone(zone, elapsed_ms, &adjusted);

        // Clients that sleep for round intervals give themselves away.
        let is_round = elapsed_ms % 500.0 == 0.0 || elapsed_ms % 100.0 == 0.0;
        if is_round && zone == TimingZone::AiZone && elapsed_ms > 0.0 {
            confidence = round3(confidence * 0.85);
            details.push_str(" [round-number timing detected]");
        }

        TimingAnalysis {
            elapsed_ms,
            zone,
            confidence,
            z_score: round2(z_score),
            penalty: round3(penalty),
            details,
        }
    }

    /// Analyze client-reported per-step timings for artificial regularity.
    pub fn analyze_pattern(&self, step_timings: &[f64]) -> TimingPatternAnalysis {
        if step_timings.len() < 2 {
            return TimingPatternAnalysis {
                variance_coefficient: 0.0,
                trend: Trend::Constant,
                round_number_ratio: 0.0,
                verdict: PatternVerdict::Inconclusive,
            };
        }

        let n = step_timings.len() as f64;
        let mean = step_timings.iter().sum::<f64>() / n;
        let std = (step_timings.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n).sqrt();
        let variance_coefficient = if mean > 0.0 { std / mean } else { 0.0 };

        let trend = detect_trend(step_timings);

        let round_count = step_timings
            .iter()
            .filter(|t| **t % 500.0 == 0.0 || (**t % 100.0 == 0.0 && **t % 500.0 != 0.0))
            .count();
        let round_number_ratio = round_count as f64 / n;

        let verdict = if variance_coefficient < 0.05 && step_timings.len() >= 3 {
            PatternVerdict::Artificial
        } else if round_number_ratio > 0.5 {
            PatternVerdict::Artificial
        } else if variance_coefficient > 0.1 {
            PatternVerdict::Natural
        } else {
            PatternVerdict::Inconclusive
        };

        TimingPatternAnalysis {
            variance_coefficient: round3(variance_coefficient),
            trend,
            round_number_ratio: round2(round_number_ratio),
            verdict,
        }
    }

    fn default_baseline(&self) -> TimingBaseline {
        TimingBaseline {
            challenge_type: "default".into(),
            difficulty: Difficulty::Medium,
            mean_ms: (self.defaults.ai_lower + self.defaults.ai_upper) / 2.0,
            std_ms: (self.defaults.ai_upper - self.defaults.ai_lower) / 4.0,
            too_fast_ms: self.defaults.too_fast,
            ai_lower_ms: self.defaults.ai_lower,
            ai_upper_ms: self.defaults.ai_upper,
            human_ms: self.defaults.human,
            timeout_ms: self.defaults.timeout,
        }
    }
}

impl Default for TimingAnalyzer {
    fn default() -> Self {
        TimingAnalyzer::new(&TimingConfig::default())
    }
}

fn classify_zone(elapsed: f64, baseline: &TimingBaseline) -> TimingZone {
    if elapsed < baseline.too_fast_ms {
        TimingZone::TooFast
    } else if elapsed <= baseline.ai_upper_ms {
        TimingZone::AiZone
    } else if elapsed <= baseline.human_ms {
        TimingZone::Suspicious
    } else if elapsed <= baseline.timeout_ms {
        TimingZone::Human
    } else {
        TimingZone::Timeout
    }
}

fn compute_penalty(zone: TimingZone, elapsed: f64, baseline: &TimingBaseline) -> f64 {
    match zone {
        TimingZone::TooFast => 1.0,
        TimingZone::AiZone => 0.0,
        TimingZone::Suspicious => {
            let range = baseline.human_ms - baseline.ai_upper_ms;
            if range <= 0.0 {
                return 0.5;
            }
            let position = (elapsed - baseline.ai_upper_ms) / range;
            0.3 + position * 0.4
        }
        TimingZone::Human => 0.9,
        TimingZone::Timeout => 1.0,
    }
}

fn compute_z_score(elapsed: f64, baseline: &TimingBaseline) -> f64 {
    if baseline.std_ms == 0.0 {
        return 0.0;
    }
    (elapsed - baseline.mean_ms) / baseline.std_ms
}

fn compute_confidence(elapsed: f64, baseline: &TimingBaseline, zone: TimingZone) -> f64 {
    match zone {
        TimingZone::TooFast => {
            let ratio = elapsed / baseline.too_fast_ms;
            (1.0 - ratio).max(0.5)
        }
        TimingZone::AiZone => {
            let dist = (elapsed - baseline.mean_ms).abs();
            let normalized = if baseline.std_ms > 0.0 {
                dist / baseline.std_ms
            } else {
                0.0
            };
            (1.0 - normalized * 0.15).clamp(0.5, 1.0)
        }
        TimingZone::Suspicious => {
            let range = baseline.human_ms - baseline.ai_upper_ms;
            if range <= 0.0 {
                return 0.4;
            }
            0.4 + 0.2 * ((elapsed - baseline.ai_upper_ms) / range)
        }
        TimingZone::Human => 0.8,
        TimingZone::Timeout => 0.95,
    }
}

fn describe_zone(zone: TimingZone, elapsed: f64, baseline: &TimingBaseline) -> String {
    let ms = elapsed.round();
    match zone {
        TimingZone::TooFast => format!(
            "Response time {ms}ms is below {}ms threshold; likely pre-computed or scripted",
            baseline.too_fast_ms
        ),
        TimingZone::AiZone => format!(
            "Response time {ms}ms is within expected AI range [{}ms, {}ms]",
            baseline.ai_lower_ms, baseline.ai_upper_ms
        ),
        TimingZone::Suspicious => {
            format!("Response time {ms}ms exceeds AI range; possible human assistance")
        }
        TimingZone::Human => format!(
            "Response time {ms}ms exceeds {}ms; likely human solver",
            baseline.human_ms
        ),
        TimingZone::Timeout => format!(
            "Response time {ms}ms exceeds timeout threshold of {}ms",
            baseline.timeout_ms
        ),
    }
}

fn detect_trend(timings: &[f64]) -> Trend {
    if timings.len() < 3 {
        return Trend::Variable;
    }

    let n = timings.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = timings.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, t) in timings.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (t - y_mean);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        return Trend::Constant;
    }
    let slope = numerator / denominator;
    let normalized = if y_mean > 0.0 { slope / y_mean } else { 0.0 };

    if normalized.abs() < 0.05 {
        Trend::Constant
    } else if normalized > 0.1 {
        Trend::Increasing
    } else if normalized < -0.1 {
        Trend::Decreasing
    } else {
        Trend::Variable
    }
}
