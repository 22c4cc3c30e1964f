use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farmchat::api::{self, AppState};
use farmchat::config::Config;
use farmchat::db::{Executor, PoolManager};
use farmchat::services::{llm::OpenAiClient, naver_news::NaverNewsClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmchat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting farmchat server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        execute_sql = config.execute_sql,
        news_configured = config.naver_client_id.is_some(),
        "Configuration loaded successfully"
    );

    // The pool itself is built on first use
    let pool_manager = Arc::new(PoolManager::new(&config.database));
    let keep_alive = pool_manager.spawn_keep_alive();
    let executor = Executor::new(pool_manager.clone());

    let llm = Arc::new(OpenAiClient::new(
        &config.openai_base_url,
        config.openai_api_key.clone(),
    ));
    let news = Arc::new(NaverNewsClient::new(
        &config.naver_base_url,
        config.naver_client_id.clone(),
        config.naver_client_secret.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(config, executor, llm, news);
    let app = api::router(state);

    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    keep_alive.abort();
    pool_manager.close().await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
