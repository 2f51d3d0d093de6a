/// Database layer for Tasklane
///
/// Manages the connection pool, embedded migrations and the transaction
/// boundary shared by every service. Store functions in `account` and
/// `task` borrow a connection and never open or close transactions.

pub mod account;
pub mod task;

use crate::{
    config::DatabaseConfig,
    error::{ApiError, ApiResult},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Sqlite, Transaction,
};
use std::{str::FromStr, time::Duration};

/// Create a SQLite connection pool
pub async fn create_pool(config: &DatabaseConfig) -> ApiResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    // Ensure parent directory exists
    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to create data directory: {}", e)))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .max_lifetime(Duration::from_secs(config.max_lifetime))
        .idle_timeout(Duration::from_secs(config.idle_timeout))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ApiError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Close a transaction according to the outcome of the work done in it.
///
/// `Ok` commits; a failed commit is reported as an internal error. `Err`
/// rolls back and hands the original error back unchanged.
pub async fn commit_or_rollback<T>(
    tx: Transaction<'_, Sqlite>,
    result: ApiResult<T>,
) -> ApiResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to commit transaction: {}", e)))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!("rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

/// Single-connection in-memory database with migrations applied
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    // One connection that never expires, or the in-memory database vanishes
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_connection_succeeds() {
        let pool = test_pool().await;
        assert_ok!(test_connection(&pool).await);
    }

    #[tokio::test]
    async fn test_connection_fails_after_close() {
        let pool = test_pool().await;
        pool.close().await;
        assert_err!(test_connection(&pool).await);
    }

    #[tokio::test]
    async fn test_commit_on_ok() {
        let pool = test_pool().await;
        let mut tx = pool.begin().await.unwrap();
        let result = sqlx::query("CREATE TABLE scratch (id INTEGER)")
            .execute(&mut *tx)
            .await
            .map(|_| ())
            .map_err(ApiError::from);

        commit_or_rollback(tx, result).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_rollback_on_err() {
        let pool = test_pool().await;
        sqlx::query("CREATE TABLE scratch (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        sqlx::query("INSERT INTO scratch (id) VALUES (1)")
            .execute(&mut *tx)
            .await
            .unwrap();

        let err = commit_or_rollback::<()>(tx, Err(ApiError::NotFound("gone".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
