//! Bayesian model-family classifier over canary evidence.
//!
//! Posteriors start uniform and are multiplied by a per-canary likelihood,
//! renormalising after every update to prevent underflow.

use std::collections::HashMap;

use super::extractor::{case_insensitive, leading_number, CanaryExtractor};
use super::{Canary, CanaryAnalysis, ModelAlternative, ModelIdentification};
use crate::types::round3;

pub const DEFAULT_MODEL_FAMILIES: &[&str] = &[
    "gpt-4-class",
    "claude-3-class",
    "gemini-class",
    "llama-class",
    "mistral-class",
];

pub struct ModelClassifier {
    families: Vec<String>,
    confidence_threshold: f64,
    extractor: CanaryExtractor,
}

impl ModelClassifier {
    pub fn new(families: Vec<String>, confidence_threshold: f64) -> Self {
        ModelClassifier {
            families,
            confidence_threshold,
            extractor: CanaryExtractor::new(),
        }
    }

    pub fn with_default_families(confidence_threshold: f64) -> Self {
        ModelClassifier::new(
            DEFAULT_MODEL_FAMILIES.iter().map(|f| f.to_string()).collect(),
            confidence_threshold,
        )
    }

    /// Classify from the injected canaries and the client's responses.
    ///
    /// With no responses (or no canaries) the result is "unknown" at zero
    /// confidence. Below the threshold the best guess is still reported, at
    /// the head of `alternatives`.
    pub fn classify(
        &self,
        canaries: &[Canary],
        responses: Option<&HashMap<String, String>>,
    ) -> ModelIdentification {
        let responses = match responses {
            Some(r) if !canaries.is_empty() => r,
            _ => return ModelIdentification::unknown(),
        };

        let evidence = self.extractor.extract(canaries, responses);
        if evidence.is_empty() {
            return ModelIdentification::unknown();
        }

        let mut posteriors = vec![1.0 / self.families.len() as f64; self.families.len()];

        for canary in canaries {
            let Some(response) = responses.get(&canary.id) else {
                continue;
            };
            for (i, family) in self.families.iter().enumerate() {
                posteriors[i] *= self.likelihood(canary, response, family);
            }
            normalize(&mut posteriors);
        }

        let (best_index, best_confidence) = posteriors.iter().enumerate().fold(
            (0, 0.0),
            |(best_i, best_p), (i, &p)| {
                if p > best_p {
                    (i, p)
                } else {
                    (best_i, best_p)
                }
            },
        );
        let best_family = self.families[best_index].clone();

        let mut alternatives: Vec<ModelAlternative> = self
            .families
            .iter()
            .zip(&posteriors)
            .filter(|(family, _)| **family != best_family)
            .map(|(family, &posterior)| ModelAlternative {
                family: family.clone(),
                confidence: round3(posterior),
            })
            .collect();
        alternatives.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if best_confidence < self.confidence_threshold {
            alternatives.insert(
                0,
                ModelAlternative {
                    family: best_family,
                    confidence: round3(best_confidence),
                },
            );
            return ModelIdentification {
                family: "unknown".into(),
                confidence: round3(best_confidence),
                evidence,
                alternatives,
            };
        }

        ModelIdentification {
            family: best_family,
            confidence: round3(best_confidence),
            evidence,
            alternatives,
        }
    }

    fn likelihood(&self, canary: &Canary, response: &str, family: &str) -> f64 {
        let weight = canary.confidence_weight;
        match &canary.analysis {
            CanaryAnalysis::ExactMatch { expected } => {
                let Some(value) = expected.get(family) else {
                    return 0.5;
                };
                if response.trim().eq_ignore_ascii_case(value.trim()) {
                    0.5 + 0.5 * weight
                } else {
                    0.5 - 0.4 * weight
                }
            }
            CanaryAnalysis::Pattern { patterns } => {
                let Some(pattern) = patterns.get(family) else {
                    return 0.5;
                };
                match case_insensitive(pattern) {
                    Some(re) if re.is_match(response) => 0.5 + 0.45 * weight,
                    Some(_) => 0.5 - 0.35 * weight,
                    // unparseable pattern: no signal either way
                    None => 0.5,
                }
            }
            CanaryAnalysis::Statistical { distributions } => {
                let Some(dist) = distributions.get(family) else {
                    return 0.5;
                };
                let Some(value) = leading_number(response) else {
                    return 0.5;
                };
                let pdf = gaussian_pdf(value, dist.mean, dist.stddev);
                let max_pdf = gaussian_pdf(dist.mean, dist.mean, dist.stddev);
                let normalized = if max_pdf > 0.0 { pdf / max_pdf } else { 0.0 };
                0.1 + 0.8 * normalized * weight
            }
        }
    }
}

fn gaussian_pdf(x: f64, mean: f64, stddev: f64) -> f64 {
    let z = (x - mean) / stddev;
    (-0.5 * z * z).exp() / (stddev * (2.0 * std::f64::consts::PI).sqrt())
}

fn normalize(posteriors: &mut [f64]) {
    let total: f64 = posteriors.iter().sum();
    if total == 0.0 {
        let uniform = 1.0 / posteriors.len() as f64;
        posteriors.fill(uniform);
        return;
    }
    for p in posteriors.iter_mut() {
        *p /= total;
    }
}
