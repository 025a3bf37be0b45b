use crate::error::{Result, SubledgerError};
use sea_orm_migration::MigratorTrait;

/// Apply pending migrations
///
/// ```rust,ignore
/// use subledger::database::{Migrator, run_migrations};
///
/// run_migrations::<Migrator>(&db).await?;
/// ```
pub async fn run_migrations<M: MigratorTrait>(db: &sea_orm::DatabaseConnection) -> Result<()> {
    let pending = M::get_pending_migrations(db)
        .await
        .map_err(|e| SubledgerError::database(format!("Migration status check failed: {}", e)))?
        .len();

    M::up(db, None)
        .await
        .map_err(|e| SubledgerError::database(format!("Migration failed: {}", e)))?;

    tracing::info!(applied = pending, "Subledger schema up to date");
    Ok(())
}
