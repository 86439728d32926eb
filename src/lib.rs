//! AgentAuth — a challenge/response protocol engine that issues short-lived,
//! capability-scored bearer tokens to autonomous software agents.
//!
//! A client requests a challenge, the server returns a machine-solvable
//! puzzle, the client submits an answer with a session-bound HMAC, and the
//! server returns either a signed capability token or a typed failure
//! reason. Alongside answer verification the engine fingerprints the
//! responding model family from injected canary probes (PoMI) and classifies
//! response latency against per-challenge baselines.
//!
//! The crate is an embeddable engine; `src/main.rs` wraps it in the
//! reference HTTP server.

pub mod challenges;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod guard;
pub mod http;
pub mod pomi;
pub mod registry;
pub mod store;
pub mod timing;
pub mod token;
pub mod types;

pub use challenges::{
    AmbiguousLogicDriver, ChallengeDriver, CodeExecutionDriver, CryptoNlDriver, MultiStepDriver,
};
pub use engine::{AgentAuthEngine, EngineConfig};
pub use error::{AgentAuthError, Result};
pub use guard::{verify_request, GuardConfig, GuardResult};
pub use registry::DriverRegistry;
pub use store::{ChallengeStore, MemoryStore};
pub use token::{TokenClaims, TokenManager};
pub use types::{
    CapabilityScore, Challenge, ChallengeData, ChallengePayload, Difficulty, Dimension,
    FailReason, InitChallengeOptions, InitChallengeResult, SolveInput, SolveOutcome,
    VerifyTokenResult,
};
