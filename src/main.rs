use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agentauth::challenges::{
    AmbiguousLogicDriver, ChallengeDriver, CodeExecutionDriver, CryptoNlDriver, MultiStepDriver,
};
use agentauth::config::Config;
use agentauth::engine::AgentAuthEngine;
use agentauth::http;
use agentauth::store::MemoryStore;

fn print_help() {
    println!(
        "\
agentauth v{}

Challenge/response authentication server for autonomous agents.

USAGE:
    agentauth [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/server.toml]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG              Log level filter for tracing
                          (e.g. debug, agentauth=debug,warn)
    AGENTAUTH_SECRET      Token signing secret (at least 32 bytes)

EXAMPLES:
    agentauth                            # uses config/server.toml
    agentauth /etc/agentauth/server.toml # custom config path
    RUST_LOG=debug agentauth             # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("agentauth v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Initialize logging (RUST_LOG=debug for debug mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agentauth=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());

    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)
        .with_context(|| format!("cannot load configuration from {config_path}"))?;

    let drivers: Vec<Arc<dyn ChallengeDriver>> = vec![
        Arc::new(CryptoNlDriver),
        Arc::new(MultiStepDriver),
        Arc::new(AmbiguousLogicDriver),
        Arc::new(CodeExecutionDriver),
    ];
    info!(
        "Drivers: {}",
        drivers
            .iter()
            .map(|d| d.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "Challenge TTL: {}s, token TTL: {}s, min score: {}",
        config.auth.challenge_ttl_seconds, config.auth.token_ttl_seconds, config.auth.min_score
    );
    info!(
        "PoMI: {}, timing analysis: {}, session tracking: {}",
        if config.pomi.enabled { "enabled" } else { "disabled" },
        if config.timing.enabled { "enabled" } else { "disabled" },
        if config.timing.session_tracking.enabled { "enabled" } else { "disabled" },
    );

    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(AgentAuthEngine::new(
        config.engine_config(),
        Arc::clone(&store) as Arc<dyn agentauth::store::ChallengeStore>,
        drivers,
    )?);

    // Periodic eviction sweep; `get` also evicts lazily, this bounds the
    // memory held by challenges that are never fetched again.
    let sweep_interval = Duration::from_secs(config.auth.challenge_ttl_seconds.max(1));
    tokio::spawn({
        let store = Arc::clone(&store);
        async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                let evicted = store.sweep().await;
                if evicted > 0 {
                    info!("Evicted {evicted} expired challenges");
                }
            }
        }
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Listening on http://{addr}");

    let app = http::router(engine);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received, exiting");
        })
        .await?;

    Ok(())
}
