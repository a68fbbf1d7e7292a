//! Cleanup command - removes expired API keys once

use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let (state, _) = crate::create_app_state(&config).await?;
    let removed = state.api_key_service.cleanup_expired().await?;

    info!(removed, "Expired API key cleanup finished");

    Ok(())
}
