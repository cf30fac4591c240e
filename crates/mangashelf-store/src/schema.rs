//! Schema definitions and migration utilities.
//!
//! The SQL lives in the workspace `migrations/` directory and is embedded at
//! compile time. Every statement is guarded with `IF NOT EXISTS`, so running
//! the full set on each start is safe.

use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};

/// Embedded migration SQL for the catalog (001_catalog.sql).
pub const CATALOG_MIGRATION: &str = include_str!("../../../migrations/001_catalog.sql");

/// Embedded migration SQL for the coin ledger (002_ledger.sql).
pub const LEDGER_MIGRATION: &str = include_str!("../../../migrations/002_ledger.sql");

/// Embedded migration SQL for reader engagement (003_engagement.sql).
pub const ENGAGEMENT_MIGRATION: &str = include_str!("../../../migrations/003_engagement.sql");

const MIGRATIONS: [(&str, &str); 3] = [
    ("001_catalog.sql", CATALOG_MIGRATION),
    ("002_ledger.sql", LEDGER_MIGRATION),
    ("003_engagement.sql", ENGAGEMENT_MIGRATION),
];

/// Run all migrations against the database, in order.
///
/// # Errors
///
/// Returns an error if any migration fails to execute.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    tracing::info!("Running database migrations...");

    for (name, sql) in MIGRATIONS {
        tracing::debug!("Running migration ({})...", name);
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .map_err(|e| StoreError::MigrationError(format!("{} failed: {}", name, e)))?;
    }

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// Check if the schema has been initialized.
///
/// Returns true if the `wallets` table exists.
pub async fn is_schema_initialized(pool: &PgPool) -> StoreResult<bool> {
    let result: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = 'wallets'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_migration_embedded() {
        assert!(CATALOG_MIGRATION.contains("CREATE TABLE IF NOT EXISTS comics"));
        assert!(CATALOG_MIGRATION.contains("CREATE TABLE IF NOT EXISTS chapters"));
        assert!(CATALOG_MIGRATION.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn test_ledger_migration_embedded() {
        assert!(LEDGER_MIGRATION.contains("CREATE TABLE IF NOT EXISTS wallets"));
        assert!(LEDGER_MIGRATION.contains("CHECK (coins >= 0)"));
        assert!(LEDGER_MIGRATION.contains("PRIMARY KEY (user_id, comic_id)"));
        assert!(LEDGER_MIGRATION.contains("PRIMARY KEY (user_id, chapter_id)"));
        assert!(LEDGER_MIGRATION.contains("WHERE is_active"));
    }

    #[test]
    fn test_engagement_migration_embedded() {
        assert!(ENGAGEMENT_MIGRATION.contains("CREATE TABLE IF NOT EXISTS favorites"));
        assert!(ENGAGEMENT_MIGRATION.contains("CREATE TABLE IF NOT EXISTS notifications"));
        assert!(ENGAGEMENT_MIGRATION.contains("CREATE TABLE IF NOT EXISTS reserved_usernames"));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        for (name, sql) in MIGRATIONS {
            for statement in sql.split(';').map(str::trim).filter(|s| s.contains("CREATE")) {
                assert!(
                    statement.contains("IF NOT EXISTS"),
                    "{name}: unguarded statement: {statement}"
                );
            }
        }
    }
}
