use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub user_id: String,
    pub last_synced_at: DateTime<Utc>,
}

pub trait SyncStateRepository: Send + Sync {
    fn load(&self, user_id: &str) -> Result<Option<SyncState>, InfraError>;
    fn save(&self, user_id: &str, last_synced_at: DateTime<Utc>) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSyncStateRepository {
    db_path: PathBuf,
}

impl SqliteSyncStateRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }
}

impl SyncStateRepository for SqliteSyncStateRepository {
    fn load(&self, user_id: &str) -> Result<Option<SyncState>, InfraError> {
        let connection = open_connection(&self.db_path)?;
        let row: Option<String> = connection
            .query_row(
                "SELECT last_synced_at FROM sync_state WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(last_synced_raw) = row else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&last_synced_raw).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid sync_state.last_synced_at '{}': {error}",
                last_synced_raw
            ))
        })?;

        Ok(Some(SyncState {
            user_id: user_id.to_string(),
            last_synced_at: parsed.with_timezone(&Utc),
        }))
    }

    fn save(&self, user_id: &str, last_synced_at: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = open_connection(&self.db_path)?;
        connection.execute(
            "INSERT INTO sync_state (user_id, last_synced_at)
             VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
               last_synced_at = excluded.last_synced_at",
            params![user_id, last_synced_at.to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySyncStateRepository {
    states: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SyncStateRepository for InMemorySyncStateRepository {
    fn load(&self, user_id: &str) -> Result<Option<SyncState>, InfraError> {
        let states = self
            .states
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("sync state lock poisoned: {error}")))?;
        Ok(states.get(user_id).map(|last_synced_at| SyncState {
            user_id: user_id.to_string(),
            last_synced_at: *last_synced_at,
        }))
    }

    fn save(&self, user_id: &str, last_synced_at: DateTime<Utc>) -> Result<(), InfraError> {
        let mut states = self
            .states
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("sync state lock poisoned: {error}")))?;
        states.insert(user_id.to_string(), last_synced_at);
        Ok(())
    }
}
