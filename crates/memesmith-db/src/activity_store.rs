use memesmith_common::{Error, Result};
use rusqlite::{Connection, params};
use std::path::Path;
use tracing::info;

/// One row of `chat_messages`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChatMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Outcome of one pipeline run, written to `meme_generation_logs`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub trigger: Option<String>,
    pub search_query: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Durable record of seen messages and meme generations.
pub struct ActivityStore {
    conn: Connection,
}

impl ActivityStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening activity store at {}", db_path.display());
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS chat_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    chat_id INTEGER NOT NULL,
                    message_id INTEGER NOT NULL,
                    user_id INTEGER,
                    username TEXT,
                    text TEXT NOT NULL,
                    timestamp TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
                    ON chat_messages(chat_id, timestamp);

                CREATE TABLE IF NOT EXISTS meme_generation_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    chat_id INTEGER NOT NULL,
                    user_id INTEGER,
                    trigger_emoji TEXT,
                    search_query TEXT NOT NULL,
                    success INTEGER NOT NULL,
                    error_message TEXT,
                    generation_time REAL,
                    timestamp TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_generation_logs_chat
                    ON meme_generation_logs(chat_id, timestamp);",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn save_message(
        &self,
        chat_id: i64,
        message_id: i64,
        user_id: Option<i64>,
        username: Option<&str>,
        text: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO chat_messages (chat_id, message_id, user_id, username, text, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    chat_id,
                    message_id,
                    user_id,
                    username,
                    text,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to save message: {e}")))?;
        Ok(())
    }

    pub fn log_generation(&self, record: &GenerationRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO meme_generation_logs
                    (chat_id, user_id, trigger_emoji, search_query, success,
                     error_message, generation_time, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.chat_id,
                    record.user_id,
                    record.trigger,
                    record.search_query,
                    record.success,
                    record.error_message,
                    record.duration_secs,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to log generation: {e}")))?;
        Ok(())
    }

    /// Most recent messages of a chat in chronological order.
    pub fn recent_messages(&self, chat_id: i64, limit: usize) -> Result<Vec<StoredChatMessage>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT chat_id, message_id, user_id, username, text, timestamp
                 FROM chat_messages
                 WHERE chat_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(format!("failed to prepare message query: {e}")))?;

        let rows = stmt
            .query_map(params![chat_id, limit as i64], |row| {
                let timestamp_raw: String = row.get(5)?;
                Ok(StoredChatMessage {
                    chat_id: row.get(0)?,
                    message_id: row.get(1)?,
                    user_id: row.get(2)?,
                    username: row.get(3)?,
                    text: row.get(4)?,
                    timestamp: parse_timestamp(&timestamp_raw),
                })
            })
            .map_err(|e| Error::Database(format!("failed to load messages: {e}")))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(
                row.map_err(|e| Error::Database(format!("failed to read message row: {e}")))?,
            );
        }

        // Query is DESC for efficient tail fetch; return in chronological order.
        messages.reverse();
        Ok(messages)
    }

    /// Most recent generation records of a chat, newest first.
    pub fn recent_generations(&self, chat_id: i64, limit: usize) -> Result<Vec<GenerationRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT chat_id, user_id, trigger_emoji, search_query, success,
                        error_message, generation_time
                 FROM meme_generation_logs
                 WHERE chat_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(format!("failed to prepare generation query: {e}")))?;

        let rows = stmt
            .query_map(params![chat_id, limit as i64], |row| {
                Ok(GenerationRecord {
                    chat_id: row.get(0)?,
                    user_id: row.get(1)?,
                    trigger: row.get(2)?,
                    search_query: row.get(3)?,
                    success: row.get(4)?,
                    error_message: row.get(5)?,
                    duration_secs: row.get(6)?,
                })
            })
            .map_err(|e| Error::Database(format!("failed to load generations: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read generation row: {e}")))
    }
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}
