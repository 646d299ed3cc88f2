//! SQLite-based session store implementation

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::{SessionIdentity, SessionStore, StorageResult};

/// SQLite-backed memory slots
///
/// Uses a single connection behind a mutex; slots are tiny and written only on
/// login transitions.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    staged: Mutex<HashMap<String, SessionIdentity>>,
}

impl SqliteSessionStore {
    /// Create or open a session store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening session store at {:?}", path);

        let store = Self::from_connection(Connection::open(path)?)?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            staged: Mutex::new(HashMap::new()),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS memory_slots (
                name TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        debug!("Session store schema initialized");
        Ok(())
    }

    fn load(&self, key: &str) -> StorageResult<Option<SessionIdentity>> {
        let conn = self.conn.lock();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM memory_slots WHERE name = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> StorageResult<Option<SessionIdentity>> {
        if let Some(value) = self.staged.lock().get(key) {
            return Ok(Some(value.clone()));
        }
        self.load(key)
    }

    fn set(&self, key: &str, value: SessionIdentity) -> StorageResult<()> {
        self.staged.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn save(&self) -> StorageResult<()> {
        let mut staged = self.staged.lock();
        if staged.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let updated_at = Utc::now().to_rfc3339();
        for (name, value) in staged.iter() {
            tx.execute(
                "INSERT INTO memory_slots (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![name, serde_json::to_string(value)?, updated_at],
            )?;
        }
        tx.commit()?;

        debug!("Saved {} memory slot(s)", staged.len());
        staged.clear();
        Ok(())
    }
}
