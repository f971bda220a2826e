pub mod models;

pub use models::*;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(config: &DatabaseConfig) -> Result<DbPool> {
    info!("Initializing database at {}", config.url);

    // Pragmas are per connection, so they go on the connect options
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database url: {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.acquire_timeout_secs));

    if let Some(dir) = options.get_filename().parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Private in-memory database with the schema applied.
///
/// Limited to one connection because every `:memory:` connection is a
/// separate database.
pub async fn init_in_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: users, pvz, receptions, products
    let has_products_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='products'",
    )
    .fetch_optional(pool)
    .await?;
    if has_products_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_schema() {
        let pool = init_in_memory().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        for table in ["products", "pvz", "receptions", "users"] {
            assert!(names.contains(&table), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_rejects_second_open_reception() {
        let pool = init_in_memory().await.unwrap();
        let now = now_timestamp();

        sqlx::query("INSERT INTO pvz (id, registration_date, city) VALUES ('p1', ?, 'Казань')")
            .bind(&now)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO receptions (id, date_time, pvz_id, status) VALUES ('r1', ?, 'p1', 'in_progress')",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        let second = sqlx::query(
            "INSERT INTO receptions (id, date_time, pvz_id, status) VALUES ('r2', ?, 'p1', 'in_progress')",
        )
        .bind(&now)
        .execute(&pool)
        .await;
        assert!(second.is_err());

        sqlx::query(
            "INSERT INTO receptions (id, date_time, pvz_id, status) VALUES ('r3', ?, 'p1', 'close')",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
    }
}
