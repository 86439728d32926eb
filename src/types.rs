//! Protocol data model: challenges, capability scores, and the engine's
//! solve/verify I/O shapes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pomi::{Canary, ModelIdentification};
use crate::timing::{SessionAnomaly, TimingAnalysis, TimingPatternAnalysis};

// ── Core enums ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Adversarial,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Adversarial => "adversarial",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability category a challenge exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Reasoning,
    Execution,
    Memory,
    Ambiguity,
}

// ── Challenge types ─────────────────────────────────────────────

/// The puzzle handed to the client.
///
/// `context` is server-private (pre-computed answers, operation definitions,
/// injected canary ids). It is stripped from every client-visible view and
/// never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengePayload {
    #[serde(rename = "type")]
    pub challenge_type: String,
    pub instructions: String,
    /// Base64-encoded input bytes.
    pub data: String,
    pub steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub session_token: String,
    pub payload: ChallengePayload,
    pub difficulty: Difficulty,
    pub dimensions: Vec<Dimension>,
    /// Unix seconds.
    pub created_at: i64,
    pub expires_at: i64,
}

/// Server-side challenge state held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeData {
    pub challenge: Challenge,
    /// Hex SHA-256 of the canonical answer string.
    pub answer_hash: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: i64,
    /// Server wall-clock milliseconds at creation, for RTT-compensated
    /// latency (finer than the seconds timestamp above).
    pub created_at_server_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injected_canaries: Option<Vec<Canary>>,
}

// ── Capability scores ───────────────────────────────────────────

/// Five floats in [0,1] summarising performance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityScore {
    pub reasoning: f64,
    pub execution: f64,
    pub autonomy: f64,
    pub speed: f64,
    pub consistency: f64,
}

impl CapabilityScore {
    pub fn zero() -> Self {
        CapabilityScore {
            reasoning: 0.0,
            execution: 0.0,
            autonomy: 0.0,
            speed: 0.0,
            consistency: 0.0,
        }
    }

    /// Unweighted mean of the five dimensions, as used by the request guard.
    pub fn mean(&self) -> f64 {
        (self.reasoning + self.execution + self.autonomy + self.speed + self.consistency) / 5.0
    }
}

/// Protocol-level failure reasons surfaced by `solve_challenge`.
///
/// These ride in a 200 response with a zero score; they are not transport
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    WrongAnswer,
    Expired,
    AlreadyUsed,
    InvalidHmac,
    TooFast,
    TooSlow,
    Timeout,
    RateLimited,
}

// ── Engine I/O ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitChallengeOptions {
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub dimensions: Option<Vec<Dimension>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitChallengeResult {
    pub id: String,
    pub session_token: String,
    pub expires_at: i64,
    pub ttl_seconds: u64,
}

/// Client-visible view of a stored challenge: payload without context,
/// and no session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeView {
    pub id: String,
    pub payload: ChallengePayload,
    pub difficulty: Difficulty,
    pub dimensions: Vec<Dimension>,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveInput {
    pub answer: String,
    /// `hex(HMAC_SHA256(key=session_token, message=answer))`.
    pub hmac: String,
    #[serde(default)]
    pub canary_responses: Option<HashMap<String, String>>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub client_rtt_ms: Option<f64>,
    #[serde(default)]
    pub step_timings: Option<Vec<f64>>,
}

/// Outcome of a solve attempt. Failure paths carry a zero score, a typed
/// reason, and no token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub success: bool,
    pub score: CapabilityScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_identity: Option<ModelIdentification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_analysis: Option<TimingAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_analysis: Option<TimingPatternAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_anomalies: Option<Vec<SessionAnomaly>>,
}

impl SolveOutcome {
    pub fn failure(reason: FailReason) -> Self {
        SolveOutcome {
            success: false,
            score: CapabilityScore::zero(),
            token: None,
            reason: Some(reason),
            model_identity: None,
            timing_analysis: None,
            pattern_analysis: None,
            session_anomalies: None,
        }
    }

    pub fn failure_with_timing(reason: FailReason, timing: TimingAnalysis) -> Self {
        SolveOutcome {
            timing_analysis: Some(timing),
            ..SolveOutcome::failure(reason)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl VerifyTokenResult {
    pub fn invalid() -> Self {
        VerifyTokenResult {
            valid: false,
            capabilities: None,
            model_family: None,
            issued_at: None,
            expires_at: None,
        }
    }
}

// ── Rounding helpers ────────────────────────────────────────────

/// Round to 3 decimals, the protocol's precision for scores and confidences.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Difficulty::Easy).unwrap(), "\"easy\"");
        assert_eq!(
            serde_json::from_str::<Difficulty>("\"adversarial\"").unwrap(),
            Difficulty::Adversarial
        );
    }

    #[test]
    fn test_dimension_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Dimension::Reasoning).unwrap(),
            "\"reasoning\""
        );
        assert_eq!(
            serde_json::from_str::<Dimension>("\"ambiguity\"").unwrap(),
            Dimension::Ambiguity
        );
    }

    #[test]
    fn test_fail_reason_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&FailReason::WrongAnswer).unwrap(),
            "\"wrong_answer\""
        );
        assert_eq!(
            serde_json::to_string(&FailReason::InvalidHmac).unwrap(),
            "\"invalid_hmac\""
        );
    }

    #[test]
    fn test_payload_type_field_renamed() {
        let payload = ChallengePayload {
            challenge_type: "crypto-nl".into(),
            instructions: "do things".into(),
            data: "AAAA".into(),
            steps: 1,
            context: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "crypto-nl");
        // absent context is omitted entirely
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_zero_score_mean() {
        assert_eq!(CapabilityScore::zero().mean(), 0.0);
    }

    #[test]
    fn test_score_mean() {
        let score = CapabilityScore {
            reasoning: 1.0,
            execution: 1.0,
            autonomy: 0.5,
            speed: 0.5,
            consistency: 0.5,
        };
        assert!((score.mean() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_failure_outcome_shape() {
        let outcome = SolveOutcome::failure(FailReason::Expired);
        assert!(!outcome.success);
        assert_eq!(outcome.reason, Some(FailReason::Expired));
        assert!(outcome.token.is_none());
        assert_eq!(outcome.score, CapabilityScore::zero());
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.8549999), 0.855);
        assert_eq!(round3(0.9), 0.9);
        assert_eq!(round3(0.12345), 0.123);
    }
}
