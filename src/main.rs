use std::sync::Arc;

use anyhow::Result;

use matchbook::config::AppConfig;
use matchbook::engine::Engine;
use matchbook::{gateway, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let env = std::env::var("MB_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = AppConfig::load(&env)?;
    let _guard = logging::init_logging(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %env,
        "starting matchbook"
    );

    let engine = Arc::new(Engine::new(config.market.clone()));
    gateway::run_server(&config, engine).await
}
