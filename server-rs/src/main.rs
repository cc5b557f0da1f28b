use match_engine::{DocumentStore, MemoryStore, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use padel_mate_api::config::{Config, StoreBackend};
use padel_mate_api::{build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    let (store, pool): (Arc<dyn DocumentStore>, Option<sqlx::PgPool>) =
        match config.store.backend {
            StoreBackend::Postgres => {
                let pool = db::create_pool(&config).await?;
                db::ensure_schema(&pool).await?;
                let store: Arc<dyn DocumentStore> =
                    Arc::new(db::PgDocumentStore::new(pool.clone()));
                (store, Some(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
                (store, None)
            }
        };

    let port = config.port;
    let sweep_secs = config.workflow.reminder_sweep_secs;
    let (state, dispatcher) = AppState::new(config, store, pool, Arc::new(SystemClock));

    tokio::spawn(dispatcher.run());
    if sweep_secs > 0 {
        let reminders = state.workflow.reminders.clone();
        tokio::spawn(reminders.run(Duration::from_secs(sweep_secs)));
    }

    let router = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Padel Mate API listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
