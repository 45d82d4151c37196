use std::sync::Arc;

use booktrack_api::api::{create_router, AppState};
use booktrack_api::config::Config;
use booktrack_api::db::{self, PgStore};
use booktrack_api::services::sources::{GoogleBooksSource, OpenLibrarySource, SourceManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booktrack_api=debug,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    // Search caching is best-effort; the API works without Redis
    let cache = match db::create_redis_client(&config.redis_url) {
        Ok(client) => Some(db::Cache::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, running without search cache");
            None
        }
    };

    let sources = SourceManager::new()
        .with_source(Box::new(OpenLibrarySource::new(
            config.openlibrary_url.clone(),
        )))
        .with_source(Box::new(GoogleBooksSource::new(
            config.google_books_url.clone(),
        )));

    let state = AppState::new(store, sources, cache);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
