use std::sync::Arc;

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use settings::{Database, Settings};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "moneta={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = Arc::new(
        engine::Engine::builder()
            .database(db.clone())
            .refresh_timeout(settings.rates.refresh_timeout())
            .store_timeout(settings.budgets.store_timeout())
            .build()
            .await?,
    );

    let addr = settings.server_addr();
    {
        let engine = engine.clone();
        tasks.spawn(async move {
            server::run(engine, db, &addr).await;
        });
    }

    let sweep_interval = settings.budgets.sweep_interval();
    let sweep_on_start = settings.budgets.sweep_on_start;
    tasks.spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        if !sweep_on_start {
            // the first tick completes immediately
            interval.tick().await;
        }
        loop {
            interval.tick().await;
            sweep(&engine).await;
        }
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn sweep(engine: &engine::Engine) {
    let today = Utc::now().date_naive();
    match engine.process_outdated(today).await {
        Ok(archived) if archived.is_empty() => tracing::debug!("no outdated budgets"),
        Ok(archived) => tracing::info!("archived outdated budgets: {archived:?}"),
        Err(err) => tracing::error!("outdated budget sweep failed: {err}"),
    }
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
