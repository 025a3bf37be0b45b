use std::sync::Arc;
use subledger::store::{InMemoryStore, SubscriptionStore};
use subledger::{
    App, AppContext, Config, ConfigBuilder, DataAccess, ExpirySweeper, SessionIssuer,
    SessionVerifier, cache,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Tracing may not be up yet if config failed
        eprintln!("subledger: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> subledger::Result<()> {
    let config = ConfigBuilder::new().from_env().build()?;
    subledger::init_tracing_with_config(&config);

    let store = open_store(&config).await?;
    let cache = cache::from_config(&config.cache)?;
    let access = DataAccess::new(store, cache);

    let context = AppContext::builder()
        .with_access(access.clone())
        .with_sessions(
            SessionIssuer::from_config(&config.auth)?,
            SessionVerifier::from_config(&config.auth)?,
        )
        .build()?;

    let sweeper = if config.sweep.enabled {
        Some(ExpirySweeper::new(access, config.sweep.interval()).spawn())
    } else {
        tracing::info!("Expiry sweeper disabled");
        None
    };

    App::new(config, context).serve(sweeper).await
}

#[cfg(feature = "database")]
async fn open_store(config: &Config) -> subledger::Result<Arc<dyn SubscriptionStore>> {
    use subledger::database::{self, Migrator};
    use subledger::store::SeaOrmStore;

    let Some(db_config) = &config.database else {
        return Ok(in_memory_store());
    };

    let conn = database::connect(db_config).await?;
    if db_config.auto_migrate {
        database::run_migrations::<Migrator>(&conn).await?;
    }
    Ok(Arc::new(SeaOrmStore::new(conn)))
}

#[cfg(not(feature = "database"))]
async fn open_store(config: &Config) -> subledger::Result<Arc<dyn SubscriptionStore>> {
    if config.database.is_some() {
        tracing::warn!("DATABASE_URL is set but the database feature is disabled");
    }
    Ok(in_memory_store())
}

fn in_memory_store() -> Arc<dyn SubscriptionStore> {
    tracing::warn!("No database configured, using the in-memory store with an empty plan catalog");
    Arc::new(InMemoryStore::new())
}
