use std::net::SocketAddr;
use std::sync::Arc;

use shopfloor_api::{app, AppState};
use shopfloor_order::InMemoryOrderStore;
use shopfloor_store::{Config, DbClient, PgOrderStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shopfloor_api=debug,shopfloor_order=debug,shopfloor_catalog=debug,tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Shopfloor API on port {}", config.server.port);

    let app_state = match DbClient::from_config(&config.database).await? {
        Some(db) => {
            db.migrate().await?;
            AppState::from_config(&config, Arc::new(PgOrderStore::new(db.pool.clone())))?
        }
        None => {
            tracing::warn!("No database URL configured, orders are kept in memory");
            AppState::from_config(&config, Arc::new(InMemoryOrderStore::new()))?
        }
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
