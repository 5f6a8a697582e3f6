//! SQLite-backed storage: users, topic catalog, exercises and per-chat state.
//!
//! All access goes through [`Store`], a cheap-to-clone handle around a pool.
//! Statements are plain runtime queries; the schema lives in `sql/schema.sql`.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, instrument};

pub mod chat_state;
pub mod exercises;
pub mod topics;
pub mod users;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url` and apply the schema.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its connection, so keep exactly one.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.apply_schema().await?;
        info!(target: "lalang_backend", in_memory, "Store ready");
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn apply_schema(&self) -> Result<(), sqlx::Error> {
        for stmt in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&stmt).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Drop comment lines, then split on `;` and drop empty statements.
/// The schema never puts semicolons inside literals.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let code = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    code.split(';')
        .map(|stmt| stmt.trim().to_string())
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_statements() {
        let stmts = split_sql_statements(SCHEMA_SQL);
        assert!(stmts.iter().all(|s| !s.starts_with("--")));
        assert!(stmts.iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS chat_states")));
        assert_eq!(stmts.iter().filter(|s| s.starts_with("CREATE TABLE")).count(), 5);
    }

    #[test]
    fn comment_semicolons_do_not_split_statements() {
        let sql = "-- header; with a semicolon\nCREATE TABLE a (x INTEGER);\n-- trailing; note\nCREATE INDEX i ON a (x);\n";
        assert_eq!(
            split_sql_statements(sql),
            vec!["CREATE TABLE a (x INTEGER)".to_string(), "CREATE INDEX i ON a (x)".to_string()]
        );
    }

    #[tokio::test]
    async fn schema_is_reapplicable() {
        let store = Store::in_memory().await.unwrap();
        store.apply_schema().await.unwrap();
    }
}
