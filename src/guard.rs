//! Request guard for protected endpoints: verifies a bearer token, checks
//! the minimum capability score, and formats the AgentAuth-* response
//! headers.

use std::collections::HashMap;

use crate::error::{AgentAuthError, Result};
use crate::token::{TokenClaims, TokenManager};
use crate::types::CapabilityScore;

pub mod header_names {
    pub const STATUS: &str = "AgentAuth-Status";
    pub const SCORE: &str = "AgentAuth-Score";
    pub const MODEL_FAMILY: &str = "AgentAuth-Model-Family";
    pub const CAPABILITIES: &str = "AgentAuth-Capabilities";
    pub const VERSION: &str = "AgentAuth-Version";
    pub const CHALLENGE_ID: &str = "AgentAuth-Challenge-Id";
    pub const TOKEN_EXPIRES: &str = "AgentAuth-Token-Expires";
}

#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub secret: String,
    pub min_score: f64,
}

impl GuardConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        GuardConfig {
            secret: secret.into(),
            min_score: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardResult {
    pub claims: TokenClaims,
    pub headers: HashMap<String, String>,
}

/// Verify a bearer token and check the unweighted mean of the five
/// capabilities against `min_score`.
///
/// Token failures are 401-class errors, an insufficient score is 403.
pub fn verify_request(token: &str, config: &GuardConfig) -> Result<GuardResult> {
    let verifier = TokenManager::new(config.secret.clone());
    let claims = verifier.verify(token)?;

    let avg = claims.capabilities.mean();
    if avg < config.min_score {
        return Err(AgentAuthError::InsufficientScore {
            score: avg,
            min_score: config.min_score,
        });
    }

    let mut headers = HashMap::new();
    headers.insert(header_names::STATUS.to_owned(), "verified".to_owned());
    headers.insert(header_names::SCORE.to_owned(), format!("{avg:.2}"));
    headers.insert(
        header_names::MODEL_FAMILY.to_owned(),
        claims.model_family.clone(),
    );
    headers.insert(
        header_names::CAPABILITIES.to_owned(),
        format_capabilities(&claims.capabilities),
    );
    headers.insert(
        header_names::VERSION.to_owned(),
        claims.agentauth_version.clone(),
    );
    if let Some(first) = claims.challenge_ids.first() {
        headers.insert(header_names::CHALLENGE_ID.to_owned(), first.clone());
    }
    headers.insert(
        header_names::TOKEN_EXPIRES.to_owned(),
        claims.exp.to_string(),
    );

    Ok(GuardResult { claims, headers })
}

/// Format capability scores as a comma-separated `k=v` string, e.g.
/// `reasoning=0.9,execution=0.85,autonomy=0.8,speed=0.75,consistency=0.88`.
pub fn format_capabilities(score: &CapabilityScore) -> String {
    format!(
        "reasoning={},execution={},autonomy={},speed={},consistency={}",
        score.reasoning, score.execution, score.autonomy, score.speed, score.consistency
    )
}

/// Parse a capabilities header back into dimension -> score. Malformed
/// entries are skipped.
pub fn parse_capabilities(header: &str) -> HashMap<String, f64> {
    header
        .split(',')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let parsed = value.trim().parse::<f64>().ok()?;
            Some((key.trim().to_owned(), parsed))
        })
        .collect()
}
