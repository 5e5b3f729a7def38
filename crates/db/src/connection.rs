use std::str::FromStr;
use std::time::Duration;

use concierge_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens a pool, creating the database file when it does not exist yet.
///
/// Every connection to an in-memory URL opens its own empty database, so
/// those pools are pinned to a single connection.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let timeout = Duration::from_secs(timeout_secs.max(1));
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(timeout);

    let max_connections = if is_in_memory(database_url) { 1 } else { max_connections.max(1) };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use concierge_core::config::DatabaseConfig;

    use super::{connect, connect_with_settings, is_in_memory};

    #[tokio::test]
    async fn in_memory_pool_answers_queries() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        let value: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.expect("select");
        assert_eq!(value, 1);
        pool.close().await;
    }

    #[tokio::test]
    async fn file_database_is_created_on_first_connect() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("sessions.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
            timeout_secs: 5,
        };

        let pool = connect(&config).await.expect("connect creates the file");
        assert!(path.exists());

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);
        pool.close().await;
    }

    #[tokio::test]
    async fn in_memory_pool_is_pinned_to_one_connection() {
        let pool = connect_with_settings("sqlite::memory:", 4, 5).await.expect("connect");
        assert_eq!(pool.options().get_max_connections(), 1);

        crate::migrations::run_pending(&pool).await.expect("migrate");
        for _ in 0..3 {
            let turns: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversation_turn")
                .fetch_one(&pool)
                .await
                .expect("migrated table is visible on every checkout");
            assert_eq!(turns, 0);
        }
        pool.close().await;
    }

    #[tokio::test]
    async fn busy_timeout_follows_configured_seconds() {
        let pool = connect_with_settings("sqlite::memory:", 1, 7).await.expect("connect");
        let busy_ms: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_ms, 7_000);
        pool.close().await;
    }

    #[test]
    fn in_memory_urls_are_recognised() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://shared?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://concierge.db?mode=rwc"));
    }

    #[tokio::test]
    async fn malformed_url_is_rejected() {
        assert!(connect_with_settings("postgres://nope", 1, 5).await.is_err());
    }
}
