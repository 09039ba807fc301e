use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Private in-memory database. A single connection keeps every query on the
/// same database.
pub async fn create_in_memory() -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            operation_date TEXT NOT NULL,
            month_bucket TEXT NOT NULL,
            value_date TEXT,
            label TEXT NOT NULL,
            amount TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            expense_type TEXT,
            excluded INTEGER NOT NULL DEFAULT 0,
            category TEXT,
            category_parent TEXT,
            account TEXT,
            comment TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_month ON transactions(month_bucket)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learned_patterns (
            merchant_token TEXT PRIMARY KEY,
            tag TEXT NOT NULL,
            expense_type TEXT,
            confidence REAL NOT NULL,
            usage_count INTEGER NOT NULL,
            last_reinforced TEXT NOT NULL,
            origin TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Wraps a row-level decoding problem as a sqlx decode error.
pub(crate) fn decode_error(column: &str, value: &str, reason: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("column {column}: cannot decode '{value}': {reason}").into())
}
