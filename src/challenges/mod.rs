//! Challenge drivers: each generates, solves, and verifies one family of
//! machine-solvable puzzles.
//!
//! Generation and verification are synchronous pure computations (CPU, RNG,
//! hashing); only the store and the HTTP layer are asynchronous.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::crypto::{sha256_hex, timing_safe_eq};
use crate::error::{AgentAuthError, Result};
use crate::types::{ChallengePayload, Difficulty, Dimension};

pub mod ambiguous_logic;
pub mod code_execution;
pub mod crypto_nl;
pub mod multi_step;

pub use ambiguous_logic::AmbiguousLogicDriver;
pub use code_execution::CodeExecutionDriver;
pub use crypto_nl::CryptoNlDriver;
pub use multi_step::MultiStepDriver;

pub(crate) const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// One challenge family.
///
/// The canonical answer is pre-computed at generation time through
/// [`ChallengeDriver::solve`]; verification only ever compares digests.
pub trait ChallengeDriver: Send + Sync {
    fn name(&self) -> &'static str;

    fn dimensions(&self) -> &'static [Dimension];

    /// Build a fresh payload for the given difficulty.
    fn generate(&self, difficulty: Difficulty) -> Result<ChallengePayload>;

    /// Reference solver: recompute the canonical answer from the payload's
    /// server-private context.
    fn solve(&self, payload: &ChallengePayload) -> Result<String>;

    /// Hex SHA-256 of the canonical answer string.
    fn compute_answer_hash(&self, payload: &ChallengePayload) -> Result<String> {
        let answer = self.solve(payload)?;
        Ok(sha256_hex(answer.as_bytes()))
    }

    /// Hash the submitted value and compare digests in constant time.
    ///
    /// The digest is computed before the type check so a non-string costs
    /// the same as a wrong answer; non-strings never verify.
    fn verify(&self, answer_hash: &str, submitted: &Value) -> bool {
        let rendered = match submitted.as_str() {
            Some(s) => s.to_owned(),
            None => submitted.to_string(),
        };
        let submitted_hash = sha256_hex(rendered.as_bytes());
        let digests_equal = timing_safe_eq(answer_hash, &submitted_hash);
        digests_equal && submitted.is_string()
    }
}

/// Decode the payload's base64 `data` field.
pub(crate) fn decode_data(payload: &ChallengePayload) -> Result<Vec<u8>> {
    B64.decode(&payload.data)
        .map_err(|e| AgentAuthError::MalformedPayload(format!("data is not valid base64: {e}")))
}

/// Pull a typed field out of the server-private context.
pub(crate) fn context_field<T: DeserializeOwned>(
    payload: &ChallengePayload,
    key: &str,
) -> Result<T> {
    let context = payload
        .context
        .as_ref()
        .ok_or_else(|| AgentAuthError::MalformedPayload("missing context".into()))?;
    let value = context
        .get(key)
        .ok_or_else(|| AgentAuthError::MalformedPayload(format!("context missing \"{key}\"")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| AgentAuthError::MalformedPayload(format!("context field \"{key}\": {e}")))
}
