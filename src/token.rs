//! Capability tokens: HS256 JWTs carrying the five-dimensional score.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentAuthError, Result};
use crate::types::CapabilityScore;

pub const ISSUER: &str = "agentauth";
pub const AGENTAUTH_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Challenge id the token was earned on.
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub capabilities: CapabilityScore,
    pub model_family: String,
    pub challenge_ids: Vec<String>,
    pub agentauth_version: String,
}

#[derive(Debug, Clone)]
pub struct TokenSignInput {
    pub sub: String,
    pub capabilities: CapabilityScore,
    pub model_family: String,
    pub challenge_ids: Vec<String>,
}

/// Signs and verifies capability tokens against a shared secret.
pub struct TokenManager {
    secret: String,
}

impl TokenManager {
    pub fn new(secret: impl Into<String>) -> Self {
        TokenManager {
            secret: secret.into(),
        }
    }

    pub fn sign(&self, input: TokenSignInput, ttl: Duration) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: input.sub,
            iss: ISSUER.to_owned(),
            iat,
            exp: iat + ttl.as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
            capabilities: input.capabilities,
            model_family: input.model_family,
            challenge_ids: input.challenge_ids,
            agentauth_version: AGENTAUTH_VERSION.to_owned(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AgentAuthError::TokenSigning(e.to_string()))
    }

    /// Verify signature, issuer, and expiration. Returns the claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AgentAuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => AgentAuthError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AgentAuthError::InvalidSignature,
            _ => AgentAuthError::InvalidToken(e.to_string()),
        })
    }

    /// Decode without verifying the signature or expiry.
    ///
    /// Useful for inspecting tokens; must never be used for authorisation.
    pub fn decode_unverified(token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| AgentAuthError::InvalidToken(e.to_string()))
    }
}
