pub mod chat;
pub mod history;

pub use chat::generate_username;
pub use history::{LogFailure, LogReport};

use crate::error::PersistenceError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nfl_data (
    datetime TEXT,
    game_id TEXT,
    date TEXT,
    home_team TEXT,
    away_team TEXT,
    home_win INTEGER,
    away_win INTEGER,
    points REAL
)"#;

const CREATE_HISTORY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_nfl_data_game ON nfl_data (game_id, datetime)";

const CREATE_CHAT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chat_messages (
    id INTEGER PRIMARY KEY,
    ip TEXT NOT NULL,
    username TEXT NOT NULL,
    message TEXT NOT NULL,
    timestamp TEXT NOT NULL
)"#;

/// SQLite-backed store for the odds history and the chat log.
///
/// Cloning is cheap; all clones share one connection pool. Writers are
/// serialized by SQLite itself (WAL journal plus a busy timeout), so several
/// refresh cycles or chat posts may hit the store at once.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `database_url` and ensure the schema
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!("Opened store at {}", database_url);
        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // one long-lived connection, otherwise the database disappears
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn init_schema(&self) -> Result<(), PersistenceError> {
        for statement in [CREATE_HISTORY_TABLE, CREATE_HISTORY_INDEX, CREATE_CHAT_TABLE] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
