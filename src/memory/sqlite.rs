//! SQLite-based persistent storage for taught responses

use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{normalize, QaPair};
use crate::error::StoreError;

/// SQLite-backed question/answer store.
///
/// The table layout (`responses(user_message, bot_response)`) matches the
/// database written by earlier versions of the bot, so an existing
/// `bot_memory.db` can be opened directly.
#[derive(Clone)]
pub struct QaStore {
    conn: Arc<Mutex<Connection>>,
}

impl QaStore {
    /// Open (or create) the store at the given path
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;

        info!("Opened response store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a throwaway store that lives only in memory
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS responses (
                user_message TEXT,
                bot_response TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_responses_question ON responses(user_message);
        "#)?;
        Ok(())
    }

    /// Append a (question, answer) pair. Never overwrites.
    pub async fn insert(&self, question: &str, answer: &str) -> Result<(), StoreError> {
        let question = normalize(question);
        let answer = normalize(answer);
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT INTO responses (user_message, bot_response) VALUES (?1, ?2)",
            params![question, answer],
        )?;

        debug!("Stored answer for question '{}'", question);
        Ok(())
    }

    /// Append a pair and return every stored pair, including the new one.
    ///
    /// Both happen in one transaction: if the pairs cannot be read back the
    /// insert is rolled back and the store is left as it was.
    pub async fn insert_and_snapshot(&self, question: &str, answer: &str) -> Result<Vec<QaPair>, StoreError> {
        let question = normalize(question);
        let answer = normalize(answer);
        let mut conn = self.conn.lock().await;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO responses (user_message, bot_response) VALUES (?1, ?2)",
            params![question, answer],
        )?;
        let pairs = read_pairs(&tx)?;
        tx.commit()?;

        debug!("Stored answer for question '{}' ({} rows)", question, pairs.len());
        Ok(pairs)
    }

    /// All distinct answers recorded for an exact (normalized) question,
    /// in the order they were first recorded
    pub async fn lookup_exact(&self, question: &str) -> Result<Vec<String>, StoreError> {
        let question = normalize(question);
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare_cached(
            "SELECT bot_response FROM responses
             WHERE user_message = ?1 AND bot_response IS NOT NULL
             GROUP BY bot_response
             ORDER BY MIN(rowid)",
        )?;

        let answers = stmt
            .query_map(params![question], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(answers)
    }

    /// Each stored question exactly once, in first-insertion order
    pub async fn list_distinct_questions(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare_cached(
            "SELECT user_message FROM responses
             WHERE user_message IS NOT NULL
             GROUP BY user_message
             ORDER BY MIN(rowid)",
        )?;

        let questions = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(questions)
    }

    /// Every stored pair in insertion order
    pub async fn all_pairs(&self) -> Result<Vec<QaPair>, StoreError> {
        let conn = self.conn.lock().await;
        read_pairs(&conn)
    }

    /// Number of stored rows
    pub async fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM responses WHERE user_message IS NOT NULL AND bot_response IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn read_pairs(conn: &Connection) -> Result<Vec<QaPair>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_message, bot_response FROM responses
         WHERE user_message IS NOT NULL AND bot_response IS NOT NULL
         ORDER BY rowid",
    )?;

    let pairs = stmt
        .query_map([], |row| {
            Ok(QaPair {
                question: row.get(0)?,
                answer: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pairs)
}
