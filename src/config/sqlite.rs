//! SQLite-backed configuration store

use super::{
    ConfigFanout, ConfigResult, ConfigStore, ConfigUpdate, Configuration, Subscription,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Persistent store. Values are JSON text keyed by the store key names.
#[derive(Clone)]
pub struct SqliteConfigStore {
    conn: Arc<Mutex<Connection>>,
    fanout: ConfigFanout,
}

impl SqliteConfigStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> ConfigResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> ConfigResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            fanout: ConfigFanout::new(),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_entries(conn: &Connection) -> ConfigResult<HashMap<String, Value>> {
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = HashMap::new();
        for row in rows {
            let (key, raw) = row?;
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    entries.insert(key, value);
                }
                Err(e) => {
                    // A corrupt value reads as missing and takes the default
                    tracing::warn!(key = %key, error = %e, "Ignoring unreadable setting");
                }
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn load(&self) -> ConfigResult<Configuration> {
        let conn = self.conn();
        let entries = Self::read_entries(&conn)?;
        Ok(Configuration::from_entries(&entries))
    }

    async fn set(&self, update: ConfigUpdate) -> ConfigResult<Configuration> {
        let mut conn = self.conn();
        let before = Configuration::from_entries(&Self::read_entries(&conn)?);

        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for (key, value) in update.entries() {
            tx.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key.as_str(), serde_json::to_string(&value)?, now],
            )?;
        }
        tx.commit()?;

        let after = Configuration::from_entries(&Self::read_entries(&conn)?);
        let changed = before.diff(&after);
        if !changed.is_empty() {
            tracing::info!(changed = ?changed, "Configuration updated");
            self.fanout.publish(changed, after.clone());
        }
        Ok(after)
    }

    fn subscribe(&self) -> Subscription {
        self.fanout.subscribe()
    }
}
