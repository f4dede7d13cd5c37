//! # TaskFlow API Server
//!
//! Serves the task-assignment and approval workflow over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! STORE_BACKEND=memory JWT_SECRET=$(openssl rand -hex 32) cargo run -p taskflow-api
//! ```

use anyhow::Context as _;
use taskflow_api::{
    app::{build_router, AppState},
    config::{Config, StoreBackend},
};
use taskflow_shared::{
    db::{migrations, pool},
    store::Stores,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskflow_api=debug,taskflow_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "TaskFlow API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let (stores, db) = match (&config.store, &config.database) {
        (StoreBackend::Postgres, Some(database)) => {
            migrations::ensure_database_exists(&database.url)
                .await
                .context("Failed to create database")?;

            let mut db_config = pool::DatabaseConfig::new(database.url.clone());
            db_config.max_connections = database.max_connections;
            let db = pool::create_pool(db_config)
                .await
                .context("Failed to connect to database")?;

            migrations::run_migrations(&db)
                .await
                .context("Failed to run migrations")?;

            (Stores::postgres(db.clone()), Some(db))
        }
        (StoreBackend::Postgres, None) => {
            anyhow::bail!("DATABASE_URL is required for the postgres store")
        }
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            (Stores::in_memory(), None)
        }
    };

    let bind_address = config.bind_address();
    let bootstrap_admin = config.bootstrap_admin.clone();
    let state = AppState::new(stores, config);

    if let Some(admin) = bootstrap_admin {
        state
            .services
            .directory
            .ensure_bootstrap_admin(&admin.username, &admin.password, &admin.email)
            .await
            .context("Failed to create bootstrap admin")?;
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received, exiting...");
        })
        .await?;

    if let Some(db) = db {
        pool::close_pool(db).await;
    }

    Ok(())
}
