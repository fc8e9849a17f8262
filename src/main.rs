use std::sync::Arc;

use anyhow::{Context, Result};
use caption_studio::{router, AppState, Config, GeminiClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let client = GeminiClient::with_base_url(config.api_key.clone(), config.gemini_base_url.clone())
        .context("failed to build Gemini client")?;
    let state = AppState::new(Arc::new(client), config.default_prompt.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", config.bind_addr);
    tracing::info!("📸 Open in your browser to start captioning!");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
