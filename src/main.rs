use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use marquee_api::{
    api::{create_router, AppState},
    cache::{create_redis_client, Cache},
    config::Config,
    store::{create_pool, PostgresStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    let store = Arc::new(PostgresStore::new(pool));

    let cache = match create_redis_client(&config.redis_url) {
        Ok(client) => Some(Cache::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, running without cache");
            None
        }
    };

    let state = AppState::new(store.clone(), store, cache);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
