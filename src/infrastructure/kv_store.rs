use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

/// Embedded key-value store that survives restarts.
pub trait DurableKv: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Result<(), InfraError>;
    fn get(&self, key: &str) -> Result<Option<String>, InfraError>;
    fn delete(&self, key: &str) -> Result<bool, InfraError>;
    /// Entries whose key starts with `prefix`, ordered by key.
    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    db_path: PathBuf,
}

impl SqliteKvStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }
}

impl DurableKv for SqliteKvStore {
    fn put(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let connection = open_connection(&self.db_path)?;
        connection.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, InfraError> {
        let connection = open_connection(&self.db_path)?;
        let value = connection
            .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn delete(&self, key: &str) -> Result<bool, InfraError> {
        let connection = open_connection(&self.db_path)?;
        let removed = connection.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>, InfraError> {
        let connection = open_connection(&self.db_path)?;
        let mut statement = connection.prepare(
            "SELECT key, value FROM kv_store
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key",
        )?;
        let rows = statement.query_map(params![prefix], |row| {
            Ok(KvEntry {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(InfraError::from)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl InMemoryKvStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, InfraError> {
        self.entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("kv store lock poisoned: {error}")))
    }
}

impl DurableKv for InMemoryKvStore {
    fn put(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, InfraError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, InfraError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>, InfraError> {
        Ok(self
            .lock()?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| KvEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}
