mod config;
mod db;
mod frame;
mod locale;
mod model;
mod routes;
mod services;
mod session;
mod state;
mod store;
mod timefmt;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env().expect("invalid configuration");
    let port = config.port;

    // Without DATABASE_URL the board runs on the in-memory store.
    let (state, _listener) = match config.database_url.clone() {
        Some(database_url) => {
            let pool = db::init_pool(&database_url, config.db_max_connections)
                .await
                .expect("database init failed");
            let (store, listener) = PgStore::start(pool, config.app_id.clone())
                .await
                .expect("store init failed");
            store
                .provision_bootstrap_tokens(&config.bootstrap_tokens)
                .await
                .expect("bootstrap token provisioning failed");
            tracing::info!(app_id = %config.app_id, "using postgres store");
            (state::AppState::with_postgres(config, store), Some(listener))
        }
        None => {
            let store = MemoryStore::new().with_bootstrap_tokens(config.bootstrap_tokens.clone());
            tracing::warn!("DATABASE_URL not set, using in-memory store (comments are lost on restart)");
            (state::AppState::with_memory(config, Arc::new(store)), None)
        }
    };

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "feedboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
