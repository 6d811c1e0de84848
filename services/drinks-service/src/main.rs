use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use drinks_service::app::{
    build_jwt_verifier, build_router, cors_layer, spawn_jwks_refresh, AppState,
};
use drinks_service::config::ServiceConfig;
use drinks_service::store::{InMemoryMenuStore, MenuStore, PgMenuStore};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;

    let store: Arc<dyn MenuStore> = match &config.database_url {
        Some(database_url) => {
            let db = PgPool::connect(database_url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            // Ensure database schema is up to date before serving traffic
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgMenuStore::new(db))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory drink store (data is lost on exit)");
            Arc::new(InMemoryMenuStore::new())
        }
    };

    let jwt_verifier = build_jwt_verifier(&config.auth).await?;
    spawn_jwks_refresh(jwt_verifier.clone(), config.auth.jwks_refresh);

    let state = AppState::new(store, jwt_verifier);
    let app = build_router(state, cors_layer(&config.allowed_origins));

    let addr = SocketAddr::from((config.host, config.port));
    info!(%addr, "starting drinks-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
