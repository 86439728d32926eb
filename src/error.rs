use thiserror::Error;

/// Minimum length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Library error type.
///
/// Protocol-level failures (wrong answer, expired challenge, invalid HMAC…)
/// are NOT errors: they are [`crate::types::FailReason`] values inside a
/// successful solve outcome. This enum covers token verification failures,
/// guard rejections, and genuine server faults.
#[derive(Debug, Error)]
pub enum AgentAuthError {
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token issuer")]
    InvalidIssuer,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("failed to sign token: {0}")]
    TokenSigning(String),

    #[error("insufficient capability score: {score:.2} < {min_score}")]
    InsufficientScore { score: f64, min_score: f64 },

    #[error("no challenge drivers registered")]
    NoDriversRegistered,

    #[error("driver \"{0}\" is already registered")]
    DriverAlreadyRegistered(String),

    #[error("malformed challenge payload: {0}")]
    MalformedPayload(String),

    #[error("secret must be at least {MIN_SECRET_LEN} bytes")]
    SecretTooShort,

    #[error("store error: {0}")]
    Store(String),
}

impl AgentAuthError {
    /// HTTP status this error maps to on the reference surface.
    ///
    /// Token failures are 401, an insufficient capability score is 403,
    /// everything else is a server fault.
    pub fn status(&self) -> u16 {
        match self {
            AgentAuthError::TokenExpired
            | AgentAuthError::InvalidIssuer
            | AgentAuthError::InvalidSignature
            | AgentAuthError::InvalidToken(_) => 401,
            AgentAuthError::InsufficientScore { .. } => 403,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentAuthError>;
