use std::sync::Arc;

use anyhow::Context;

use campo_infra::{AppConfig, InMemoryFarmStore, PostgresFarmStore, SharedFarmStore};

use campo_api::app::{self, services::AppServices};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    campo_observability::init(config.log_format);

    let store: SharedFarmStore = match &config.database_url {
        Some(url) => {
            let store = PostgresFarmStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to prepare the database schema")?;
            tracing::info!("using postgres farm store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory farm store");
            Arc::new(InMemoryFarmStore::new())
        }
    };
    let resolver = config.resolver().context("failed to load stemmer tables")?;

    let app = app::build_app(Arc::new(AppServices::new(store, resolver)));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
