use crate::domain::day_clock::{NowProvider, system_now};
use crate::domain::models::DayKey;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::DurableKv;
use crate::infrastructure::payload::DayPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const PENDING_PREFIX: &str = "pending";

/// Latest unsynced state of one day. One entry per `(user_id, day_key)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingWrite {
    pub id: String,
    pub user_id: String,
    pub day_key: DayKey,
    pub payload: DayPayload,
    pub updated_at: DateTime<Utc>,
}

pub fn pending_write_id(user_id: &str, day_key: DayKey) -> String {
    format!("{user_id}:{day_key}")
}

fn storage_key(user_id: &str, day_key: DayKey) -> String {
    format!("{PENDING_PREFIX}:{}", pending_write_id(user_id, day_key))
}

fn user_prefix(user_id: &str) -> String {
    format!("{PENDING_PREFIX}:{user_id}:")
}

pub struct PendingWriteQueue<K>
where
    K: DurableKv + ?Sized,
{
    store: Arc<K>,
    now_provider: NowProvider,
    write_guard: Mutex<()>,
}

impl<K> PendingWriteQueue<K>
where
    K: DurableKv + ?Sized,
{
    pub fn new(store: Arc<K>) -> Self {
        Self {
            store,
            now_provider: system_now(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Queues `payload`, replacing any entry already queued for the same day.
    pub fn enqueue(&self, user_id: &str, payload: DayPayload) -> Result<PendingWrite, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        let entry = PendingWrite {
            id: pending_write_id(user_id, payload.day),
            user_id: user_id.to_string(),
            day_key: payload.day,
            payload,
            updated_at: (self.now_provider)(),
        };

        let _guard = self.lock()?;
        self.store
            .put(&storage_key(user_id, entry.day_key), &serde_json::to_string(&entry)?)?;
        Ok(entry)
    }

    pub fn dequeue(&self, user_id: &str, day_key: DayKey) -> Result<bool, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        let _guard = self.lock()?;
        self.store.delete(&storage_key(user_id, day_key))
    }

    /// Removes `delivered` only if it is still the queued entry. A newer
    /// enqueue for the same day made during delivery is kept.
    pub fn dequeue_delivered(&self, delivered: &PendingWrite) -> Result<bool, InfraError> {
        let _guard = self.lock()?;
        let key = storage_key(&delivered.user_id, delivered.day_key);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(false);
        };
        let current = serde_json::from_str::<PendingWrite>(&raw).ok();
        if current.as_ref() != Some(delivered) {
            return Ok(false);
        }
        self.store.delete(&key)
    }

    pub fn get(&self, user_id: &str, day_key: DayKey) -> Result<Option<PendingWrite>, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        let Some(raw) = self.store.get(&storage_key(user_id, day_key))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Entries for `user_id`, oldest first.
    pub fn list_pending(&self, user_id: &str) -> Result<Vec<PendingWrite>, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        let mut entries: Vec<PendingWrite> = self
            .entries_for(user_id)?
            .into_iter()
            .map(|(_, pending)| pending)
            .collect();
        entries.sort_by(|left, right| {
            left.updated_at
                .cmp(&right.updated_at)
                .then_with(|| left.day_key.cmp(&right.day_key))
        });
        Ok(entries)
    }

    /// Drops every queued entry for `user_id`. Returns how many were removed.
    pub fn clear_user(&self, user_id: &str) -> Result<usize, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        let _guard = self.lock()?;
        let mut removed = 0;
        for (key, _) in self.entries_for(user_id)? {
            if self.store.delete(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Readable entries owned by `user_id`. The key prefix alone also matches
    /// users whose id extends this one past a `:`.
    fn entries_for(&self, user_id: &str) -> Result<Vec<(String, PendingWrite)>, InfraError> {
        let mut entries = Vec::new();
        for entry in self.store.list_by_prefix(&user_prefix(user_id))? {
            match serde_json::from_str::<PendingWrite>(&entry.value) {
                Ok(pending) if pending.user_id == user_id => entries.push((entry.key, pending)),
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(key = %entry.key, %error, "skipping unreadable pending write");
                }
            }
        }
        Ok(entries)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, InfraError> {
        self.write_guard
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("pending queue lock poisoned: {error}")))
    }
}

pub fn normalized_user_id(user_id: &str) -> Result<&str, InfraError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(InfraError::InvalidInput("user_id must not be empty".to_string()));
    }
    Ok(user_id)
}
