use std::sync::Arc;

use task_backend::{
    config::AppConfig,
    counter::CounterEngine,
    db::Db,
    logger::init_tracing,
    scheduler::{pool::TokioPool, registry::JobRegistry},
    task::{repository::TaskStore, repository_sqlx::SqlxTaskRepository},
};

/// Initializes DB, runs migrations and constructs the repository.
async fn init_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn TaskStore>> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    Ok(Arc::new(SqlxTaskRepository::new(db.pool.clone())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting task backend...");

    let cfg = AppConfig::from_env();

    let store = init_store(&cfg).await?;

    let pool = Arc::new(TokioPool::new(cfg.pool_workers));
    let engine = Arc::new(CounterEngine::new(
        store,
        pool.clone(),
        Arc::new(JobRegistry::new()),
        cfg.tick_period,
    ));

    if cfg.resume_on_startup {
        // Counters left RUNNING by a previous process have no ticker otherwise.
        engine.resume_running().await?;
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    let stopped = engine.shutdown();
    pool.shutdown();
    tracing::info!(stopped, "counter jobs stopped");

    Ok(())
}
