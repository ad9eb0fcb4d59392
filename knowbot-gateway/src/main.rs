use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use knowbot_gateway::server;
use knowbot_gateway::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = knowbot_core::Config::load()?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.settings.logging.level.as_str().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Configuration loaded (remote providers: {})",
        if config.secrets.has_openai() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let state = Arc::new(AppState::from_config(&config).await?);
    info!("Knowledge store opened");

    let sweep_interval = config.settings.rate_limits.sweep_interval();
    let sweepers = [
        state.general_limiter().spawn_sweeper(sweep_interval),
        state.search_limiter().spawn_sweeper(sweep_interval),
    ];

    if config.settings.gateway.host != "127.0.0.1" && config.settings.gateway.host != "localhost" {
        tracing::warn!(
            "Gateway binding to non-localhost address: {}. This exposes the API to remote access.",
            config.settings.gateway.host
        );
    }

    let bind_addr = config.bind_addr();
    info!("Starting knowbot gateway on {}", bind_addr);

    let server_result = server::run(state, &bind_addr).await;

    for sweeper in sweepers {
        sweeper.abort();
    }

    Ok(server_result?)
}
