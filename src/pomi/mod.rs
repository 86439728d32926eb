//! PoMI — Proof of Model Identity.
//!
//! Canary probes (side-questions) are injected into challenge instructions;
//! their responses fingerprint the responding model family through a
//! Bayesian classifier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod classifier;
pub mod extractor;
pub mod injector;

pub use catalog::{CanaryCatalog, SelectOptions, CATALOG_VERSION};
pub use classifier::{ModelClassifier, DEFAULT_MODEL_FAMILIES};
pub use extractor::CanaryExtractor;
pub use injector::{CanaryInjector, InjectionResult};

/// Where a canary's prompt lands inside the challenge instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMethod {
    Prefix,
    Inline,
    Suffix,
    Embedded,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub mean: f64,
    pub stddev: f64,
}

/// How a canary response is scored, with per-family expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanaryAnalysis {
    ExactMatch { expected: BTreeMap<String, String> },
    Pattern { patterns: BTreeMap<String, String> },
    Statistical {
        distributions: BTreeMap<String, Distribution>,
    },
}

/// A side-question whose answer fingerprints the responding model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canary {
    pub id: String,
    pub prompt: String,
    pub injection_method: InjectionMethod,
    pub analysis: CanaryAnalysis,
    /// In [0,1]; how strongly this probe discriminates between families.
    pub confidence_weight: f64,
}

/// One evaluated canary response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryEvidence {
    pub canary_id: String,
    pub observed: String,
    pub expected: String,
    #[serde(rename = "match")]
    pub matched: bool,
    pub confidence_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAlternative {
    pub family: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelIdentification {
    /// Winning family, or "unknown" below the confidence threshold.
    pub family: String,
    pub confidence: f64,
    pub evidence: Vec<CanaryEvidence>,
    /// Remaining hypotheses, sorted by descending confidence.
    pub alternatives: Vec<ModelAlternative>,
}

impl ModelIdentification {
    pub fn unknown() -> Self {
        ModelIdentification {
            family: "unknown".into(),
            confidence: 0.0,
            evidence: Vec::new(),
            alternatives: Vec::new(),
        }
    }
}

/// PoMI section of the engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PomiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Overrides the default catalog when set.
    #[serde(default)]
    pub canaries: Option<Vec<Canary>>,
    #[serde(default = "default_canaries_per_challenge")]
    pub canaries_per_challenge: usize,
    #[serde(default)]
    pub model_families: Option<Vec<String>>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_canaries_per_challenge() -> usize {
    2
}

fn default_confidence_threshold() -> f64 {
    0.5
}

impl Default for PomiConfig {
    fn default() -> Self {
        PomiConfig {
            enabled: false,
            canaries: None,
            canaries_per_challenge: default_canaries_per_challenge(),
            model_families: None,
            confidence_threshold: default_confidence_threshold(),
        }
    }
}
