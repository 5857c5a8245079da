use std::sync::Arc;

use anyhow::Context;

use agrolog_api::app::{AppServices, build_app};
use agrolog_api::shutdown::shutdown_signal;
use agrolog_infra::{AppConfig, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agrolog_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let pool = if config.use_persistent_stores {
        let url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL is required for persistent stores")?;
        let pool = db::connect(url, config.database_max_connections)
            .await
            .context("failed to connect to postgres")?;
        db::migrate(&pool).await.context("failed to apply schema")?;
        Some(pool)
    } else {
        tracing::warn!("using in-memory stores; data is lost on restart");
        None
    };

    let services = match &pool {
        Some(pool) => AppServices::persistent(&config, pool.clone())?,
        None => AppServices::in_memory(&config)?,
    };
    let app = build_app(&config.jwt_secret, Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("database pool closed");
    }
    Ok(())
}
