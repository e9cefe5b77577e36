use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement,
};
use sea_orm_migration::SchemaManager;
use tracing::{debug, info};

use crate::models::EntityKind;

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options.sqlx_logging(false);
    // Every pooled connection to an in-memory database would be a separate,
    // empty database.
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;

    if db.get_database_backend() == DbBackend::Sqlite {
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL", "PRAGMA foreign_keys=ON"]
        {
            db.execute(Statement::from_string(DbBackend::Sqlite, pragma.to_string())).await?;
        }
    }

    debug!(backend = ?db.get_database_backend(), "connected to store");
    Ok(db)
}

/// Creates every table that does not exist yet. Safe to call on an
/// initialized store; applied migrations are skipped.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let pending = Migrator::get_pending_migrations(db).await?.len();
    Migrator::up(db, None).await?;
    info!(applied = pending, "schema ready");
    Ok(())
}

/// Whether the movie table and every lookup/link table exist.
pub async fn schema_ready(db: &DatabaseConnection) -> Result<bool, DbErr> {
    let manager = SchemaManager::new(db);
    if !manager.has_table("movie").await? {
        return Ok(false);
    }
    for kind in EntityKind::ALL {
        let (lookup, link) = kind.tables();
        if !manager.has_table(lookup).await? || !manager.has_table(link).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
pub async fn memory() -> DatabaseConnection {
    let db = connect("sqlite::memory:").await.expect("in-memory sqlite");
    ensure_schema(&db).await.expect("schema");
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_reported_missing_then_ready() {
        let db = connect("sqlite::memory:").await.unwrap();
        assert!(!schema_ready(&db).await.unwrap());

        ensure_schema(&db).await.unwrap();
        assert!(schema_ready(&db).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_schema_twice_is_a_no_op() {
        let db = connect("sqlite::memory:").await.unwrap();
        ensure_schema(&db).await.unwrap();
        ensure_schema(&db).await.unwrap();
        assert!(Migrator::get_pending_migrations(&db).await.unwrap().is_empty());
        assert!(schema_ready(&db).await.unwrap());
    }
}
