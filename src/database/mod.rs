mod models;

pub use models::{ChatMessage, InterviewSession, Sender};

use std::path::Path;

use log::{info, warn};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid chat history encoding: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Local store of past interview sessions.
///
/// Sessions are written once, at "end interview", and read continuously for
/// the history screen: every write republishes the full reverse-chronological
/// list on a watch channel, so readers never block writers. The chat history
/// is kept as a JSON-encoded text column.
pub struct SessionStore {
    conn: Mutex<Connection>,
    sessions_tx: watch::Sender<Vec<InterviewSession>>,
}

impl SessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests and previews.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        // AUTOINCREMENT keeps ids monotonic so a deleted session's id is
        // never handed out again.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS interview_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                mode TEXT NOT NULL,
                date INTEGER NOT NULL,
                chat_history TEXT NOT NULL
            )",
            [],
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            sessions_tx: watch::channel(Vec::new()).0,
        };
        store.sessions_tx.send_replace(store.list_all()?);
        Ok(store)
    }

    /// Inserts a finished session and returns its assigned id.
    pub fn insert(
        &self,
        role: &str,
        mode: &str,
        date: i64,
        chat_history: &[ChatMessage],
    ) -> Result<i64, StoreError> {
        let encoded = serde_json::to_string(chat_history)?;
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO interview_sessions (role, mode, date, chat_history)
                 VALUES (?1, ?2, ?3, ?4)",
                params![role, mode, date, encoded],
            )?;
            conn.last_insert_rowid()
        };
        info!("Stored interview session {} ({}, {})", id, role, mode);
        self.refresh();
        Ok(id)
    }

    /// Removes a session. Returns false when no row had that id.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let removed = {
            let conn = self.conn.lock();
            conn.execute("DELETE FROM interview_sessions WHERE id = ?1", params![id])?
        };
        if removed > 0 {
            info!("Deleted interview session {}", id);
            self.refresh();
        }
        Ok(removed > 0)
    }

    pub fn get(&self, id: i64) -> Result<Option<InterviewSession>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, role, mode, date, chat_history
                 FROM interview_sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        row.map(Self::decode_row).transpose()
    }

    /// All sessions, newest first.
    pub fn list_all(&self) -> Result<Vec<InterviewSession>, StoreError> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(
            "SELECT id, role, mode, date, chat_history
             FROM interview_sessions ORDER BY date DESC, id DESC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(Self::decode_row(row?)?);
        }
        Ok(sessions)
    }

    /// Live view of the session list; the receiver observes every insert and
    /// delete.
    pub fn watch_all(&self) -> watch::Receiver<Vec<InterviewSession>> {
        self.sessions_tx.subscribe()
    }

    pub fn stream_all(&self) -> WatchStream<Vec<InterviewSession>> {
        WatchStream::new(self.watch_all())
    }

    fn decode_row(
        (id, role, mode, date, encoded): (i64, String, String, i64, String),
    ) -> Result<InterviewSession, StoreError> {
        Ok(InterviewSession {
            id,
            role,
            mode,
            date,
            chat_history: serde_json::from_str(&encoded)?,
        })
    }

    fn refresh(&self) {
        match self.list_all() {
            Ok(sessions) => {
                self.sessions_tx.send_replace(sessions);
            }
            Err(e) => warn!("Failed to refresh session list: {}", e),
        }
    }
}
