//! Database connection pool management

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{sanitize_url, DatabaseError, Result};

/// Longest wait between two connection attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Create a `SQLite` connection pool with retry logic
///
/// Retries use exponential backoff starting at `retry_delay_secs`, capped at
/// one minute.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Database connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Database connection pool created: max={}, min={}, read_only={}",
                        config.max_connections,
                        config.min_connections,
                        config.read_only
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to database after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = backoff_delay(base_delay, attempt);

                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based)
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2_u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// Attempt to create a database pool (single try)
async fn try_create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| describe(config, e))?
        .read_only(config.read_only);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout())
        .connect_with(options)
        .await
        .map_err(|e| describe(config, e))?;

    Ok(pool)
}

fn describe(config: &DatabaseConfig, err: sqlx::Error) -> crate::error::Error {
    let url_safe = sanitize_url(&config.url);
    let hint = categorize_db_error(&err);
    DatabaseError::from(err)
        .add_context(format!("url={} ({})", url_safe, hint))
        .into()
}

/// Categorize database error for better user guidance
fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    use sqlx::Error;
    match err {
        Error::Configuration(_) => "check the sqlite:// URL format",
        Error::Database(_) => "database rejected the connection",
        Error::Io(_) => "file I/O error, check the path and permissions",
        Error::PoolTimedOut => "connection pool timeout",
        Error::PoolClosed => "connection pool closed",
        Error::WorkerCrashed => "database worker crashed",
        _ => "connection error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 5), Duration::from_secs(32));
        assert_eq!(backoff_delay(base, 6), MAX_RETRY_DELAY);
        // large retry counts from config must not overflow
        assert_eq!(backoff_delay(base, 40), MAX_RETRY_DELAY);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_RETRY_DELAY);
        assert_eq!(backoff_delay(Duration::ZERO, 100), Duration::ZERO);
    }

    fn config(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            max_connections: 1,
            min_connections: 0,
            connection_timeout_secs: 1,
            max_retries: 0,
            retry_delay_secs: 0,
            read_only: false,
        }
    }

    #[tokio::test]
    async fn test_in_memory_pool() {
        let pool = create_pool(&config("sqlite::memory:")).await.unwrap();
        let one: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one.0, 1);
    }

    #[tokio::test]
    async fn test_read_only_file_pool_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());

        let writable = create_pool(&config(&url)).await.unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER)")
            .execute(&writable)
            .await
            .unwrap();
        writable.close().await;

        let mut read_only = config(&format!("sqlite://{}", path.display()));
        read_only.read_only = true;
        let pool = create_pool(&read_only).await.unwrap();
        assert!(sqlx::query("INSERT INTO t VALUES (1)")
            .execute(&pool)
            .await
            .is_err());
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("absent.db").display());

        match create_pool(&config(&url)).await {
            Err(Error::Database(err)) => {
                assert!(err.context.unwrap().starts_with("url=sqlite://"));
            }
            other => panic!("expected database error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_categorize() {
        assert_eq!(
            categorize_db_error(&sqlx::Error::PoolClosed),
            "connection pool closed"
        );
    }
}
