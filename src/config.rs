//! TOML configuration for the reference server.
//!
//! Values support `${ENV_VAR}` substitution, so secrets stay out of the
//! config file itself.

use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::error::MIN_SECRET_LEN;
use crate::pomi::PomiConfig;
use crate::timing::TimingConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pomi: PomiConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token signing secret, at least 32 bytes. Supports ${ENV_VAR}
    /// substitution.
    pub secret: String,
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl_seconds: u64,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_challenge_ttl() -> u64 {
    30
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_min_score() -> f64 {
    0.7
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Expand environment variables like ${AGENTAUTH_SECRET}
        let expanded = shellexpand::env(&content)?;
        let config: Config = toml::from_str(&expanded)?;
        if config.auth.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("auth.secret must be at least {MIN_SECRET_LEN} bytes");
        }
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            secret: self.auth.secret.clone(),
            challenge_ttl_seconds: self.auth.challenge_ttl_seconds,
            token_ttl_seconds: self.auth.token_ttl_seconds,
            min_score: self.auth.min_score,
            pomi: self.pomi.clone(),
            timing: self.timing.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_minimal_config() {
        let config = parse(
            r#"
            [server]

            [auth]
            secret = "0123456789abcdef0123456789abcdef"
            "#,
        );
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.auth.challenge_ttl_seconds, 30);
        assert_eq!(config.auth.token_ttl_seconds, 3600);
        assert_eq!(config.auth.min_score, 0.7);
        assert!(!config.pomi.enabled);
        assert!(!config.timing.enabled);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [auth]
            secret = "0123456789abcdef0123456789abcdef"
            challenge_ttl_seconds = 60
            token_ttl_seconds = 7200
            min_score = 0.8

            [pomi]
            enabled = true
            canaries_per_challenge = 3
            confidence_threshold = 0.6
            model_families = ["gpt-4-class", "claude-3-class"]

            [timing]
            enabled = true

            [timing.session_tracking]
            enabled = true
            "#,
        );
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.challenge_ttl_seconds, 60);
        assert!(config.pomi.enabled);
        assert_eq!(config.pomi.canaries_per_challenge, 3);
        assert_eq!(config.pomi.confidence_threshold, 0.6);
        assert_eq!(config.pomi.model_families.as_ref().unwrap().len(), 2);
        assert!(config.timing.enabled);
        assert!(config.timing.session_tracking.enabled);
    }

    #[test]
    fn test_engine_config_mapping() {
        let config = parse(
            r#"
            [server]

            [auth]
            secret = "0123456789abcdef0123456789abcdef"
            min_score = 0.9
            "#,
        );
        let engine_config = config.engine_config();
        assert_eq!(engine_config.min_score, 0.9);
        assert_eq!(engine_config.challenge_ttl_seconds, 30);
    }
}
