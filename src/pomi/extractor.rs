//! Turns raw canary responses into scored evidence.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::{Canary, CanaryAnalysis, CanaryEvidence};

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+\.?\d*").expect("static regex"));

/// Leading signed decimal in a response, if any.
pub(crate) fn leading_number(text: &str) -> Option<f64> {
    NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

pub(crate) fn case_insensitive(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// Evaluates canary responses to produce evidence for model classification.
#[derive(Default)]
pub struct CanaryExtractor;

impl CanaryExtractor {
    pub fn new() -> Self {
        CanaryExtractor
    }

    pub fn extract(
        &self,
        injected: &[Canary],
        responses: &HashMap<String, String>,
    ) -> Vec<CanaryEvidence> {
        injected
            .iter()
            .filter_map(|canary| {
                responses
                    .get(&canary.id)
                    .map(|response| self.evaluate(canary, response))
            })
            .collect()
    }

    fn evaluate(&self, canary: &Canary, observed: &str) -> CanaryEvidence {
        match &canary.analysis {
            CanaryAnalysis::ExactMatch { expected } => {
                let hit = expected
                    .values()
                    .find(|v| observed.trim().eq_ignore_ascii_case(v.trim()));
                let matched = hit.is_some();
                let shown = hit
                    .cloned()
                    .or_else(|| expected.values().next().cloned())
                    .unwrap_or_default();
                CanaryEvidence {
                    canary_id: canary.id.clone(),
                    observed: observed.to_owned(),
                    expected: shown,
                    matched,
                    confidence_contribution: if matched {
                        canary.confidence_weight
                    } else {
                        canary.confidence_weight * 0.3
                    },
                }
            }
            CanaryAnalysis::Pattern { patterns } => {
                // Patterns that fail to compile degrade to a skipped family,
                // never a fatal error.
                let hit = patterns.values().find(|p| {
                    case_insensitive(p).is_some_and(|re| re.is_match(observed))
                });
                let matched = hit.is_some();
                let shown = hit
                    .cloned()
                    .or_else(|| patterns.values().next().cloned())
                    .unwrap_or_default();
                CanaryEvidence {
                    canary_id: canary.id.clone(),
                    observed: observed.to_owned(),
                    expected: shown,
                    matched,
                    confidence_contribution: if matched {
                        canary.confidence_weight
                    } else {
                        canary.confidence_weight * 0.2
                    },
                }
            }
            CanaryAnalysis::Statistical { distributions } => {
                let value = leading_number(observed);
                let hit = value.and_then(|v| {
                    distributions
                        .iter()
                        .find(|(_, d)| (v - d.mean).abs() <= 2.0 * d.stddev)
                });
                let matched = hit.is_some();
                let shown = hit
                    .map(|(family, d)| {
                        format!("{family}: mean={}, stddev={}", d.mean, d.stddev)
                    })
                    .or_else(|| {
                        distributions
                            .iter()
                            .next()
                            .map(|(family, d)| {
                                format!("{family}: mean={}, stddev={}", d.mean, d.stddev)
                            })
                    })
                    .unwrap_or_default();
                CanaryEvidence {
                    canary_id: canary.id.clone(),
                    observed: observed.to_owned(),
                    expected: shown,
                    matched,
                    confidence_contribution: if matched {
                        canary.confidence_weight * 0.7
                    } else {
                        canary.confidence_weight * 0.1
                    },
                }
            }
        }
    }
}
