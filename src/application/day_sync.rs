use crate::domain::day_clock::{NowProvider, system_now};
use crate::domain::models::{DayKey, DayRecord};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::DurableKv;
use crate::infrastructure::payload::{decode_day_payload, encode_day_record};
use crate::infrastructure::pending_queue::{PendingWrite, PendingWriteQueue, normalized_user_id};
use crate::infrastructure::remote_store::{DeleteTarget, RemoteDayStore};
use crate::infrastructure::sync_state_repository::SyncStateRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Synced,
    Queued,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: Vec<DayKey>,
    pub remaining: usize,
    pub failure: Option<String>,
}

/// Moves day records between the local queue and the remote store. Every
/// write is queued first; delivery attempts for the service are serialized.
pub struct DaySyncService<R, K, S>
where
    R: RemoteDayStore + ?Sized,
    K: DurableKv + ?Sized,
    S: SyncStateRepository + ?Sized,
{
    remote: Arc<R>,
    queue: PendingWriteQueue<K>,
    sync_state_repository: Arc<S>,
    now_provider: NowProvider,
    flush_lock: AsyncMutex<()>,
}

impl<R, K, S> DaySyncService<R, K, S>
where
    R: RemoteDayStore + ?Sized,
    K: DurableKv + ?Sized,
    S: SyncStateRepository + ?Sized,
{
    pub fn new(remote: Arc<R>, store: Arc<K>, sync_state_repository: Arc<S>) -> Self {
        Self {
            remote,
            queue: PendingWriteQueue::new(store),
            sync_state_repository,
            now_provider: system_now(),
            flush_lock: AsyncMutex::new(()),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.queue = self.queue.with_now_provider(now_provider.clone());
        self.now_provider = now_provider;
        self
    }

    pub fn enqueue(&self, user_id: &str, record: &DayRecord) -> Result<PendingWrite, InfraError> {
        record.validate().map_err(InfraError::InvalidBlocks)?;
        self.queue.enqueue(user_id, encode_day_record(record))
    }

    /// Queues `record` and tries to deliver everything pending for the user.
    /// A delivery failure leaves the record queued and is not an error.
    pub async fn save(&self, user_id: &str, record: &DayRecord) -> Result<SaveOutcome, InfraError> {
        let entry = self.enqueue(user_id, record)?;
        let report = self.flush(&entry.user_id).await?;
        if report.delivered.contains(&entry.day_key)
            && self.queue.get(&entry.user_id, entry.day_key)?.is_none()
        {
            return Ok(SaveOutcome::Synced);
        }
        Ok(SaveOutcome::Queued)
    }

    /// Delivers queued writes oldest first and stops at the first failure.
    pub async fn flush(&self, user_id: &str) -> Result<FlushReport, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        let _in_flight = self.flush_lock.lock().await;
        let mut report = FlushReport::default();

        for entry in self.queue.list_pending(user_id)? {
            match self.remote.write(entry.day_key, &entry.payload).await {
                Ok(()) => {
                    self.queue.dequeue_delivered(&entry)?;
                    report.delivered.push(entry.day_key);
                }
                Err(error) => {
                    tracing::warn!(user_id, day = %entry.day_key, %error, "delivery failed; keeping queued writes");
                    report.failure = Some(error.to_string());
                    break;
                }
            }
        }

        if !report.delivered.is_empty() {
            self.sync_state_repository.save(user_id, (self.now_provider)())?;
        }
        report.remaining = self.queue.list_pending(user_id)?.len();
        tracing::debug!(
            user_id,
            delivered = report.delivered.len(),
            remaining = report.remaining,
            "flushed pending writes"
        );
        Ok(report)
    }

    /// Reads a day, preferring an unsynced local copy. A failed remote read
    /// yields an empty record.
    pub async fn load(&self, user_id: &str, day_key: DayKey) -> Result<DayRecord, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        if let Some(record) = self.load_local(user_id, day_key)? {
            return Ok(record);
        }

        match self.remote.read(day_key).await {
            Ok(Some(payload)) => {
                let mut record = decode_day_payload(payload);
                if record.day_key != day_key {
                    tracing::warn!(requested = %day_key, received = %record.day_key, "remote returned another day");
                    record.day_key = day_key;
                }
                Ok(record)
            }
            Ok(None) => Ok(DayRecord::empty(day_key)),
            Err(error) => {
                tracing::warn!(user_id, day = %day_key, %error, "remote read failed; starting from an empty day");
                Ok(DayRecord::empty(day_key))
            }
        }
    }

    /// The queued, not yet delivered copy of a day.
    pub fn load_local(&self, user_id: &str, day_key: DayKey) -> Result<Option<DayRecord>, InfraError> {
        Ok(self
            .queue
            .get(user_id, day_key)?
            .map(|pending| decode_day_payload(pending.payload)))
    }

    /// Explicit deletes are never queued. A rejection is returned as
    /// `DeleteRejected`; on success the matching queued writes are dropped.
    pub async fn delete(&self, user_id: &str, target: DeleteTarget) -> Result<usize, InfraError> {
        let user_id = normalized_user_id(user_id)?;
        let _in_flight = self.flush_lock.lock().await;
        self.remote
            .delete(target)
            .await
            .map_err(|error| InfraError::DeleteRejected(error.to_string()))?;

        let dropped = match target {
            DeleteTarget::Day(day_key) => usize::from(self.queue.dequeue(user_id, day_key)?),
            DeleteTarget::All => self.queue.clear_user(user_id)?,
        };
        tracing::info!(user_id, ?target, dropped, "remote delete confirmed");
        Ok(dropped)
    }

    pub fn pending(&self, user_id: &str) -> Result<Vec<PendingWrite>, InfraError> {
        self.queue.list_pending(user_id)
    }

    pub fn last_synced(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, InfraError> {
        Ok(self
            .sync_state_repository
            .load(normalized_user_id(user_id)?)?
            .map(|state| state.last_synced_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Block;
    use crate::infrastructure::kv_store::InMemoryKvStore;
    use crate::infrastructure::payload::DayPayload;
    use crate::infrastructure::sync_state_repository::InMemorySyncStateRepository;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Debug, Default)]
    struct FakeRemoteDayStore {
        write_failures: Mutex<VecDeque<bool>>,
        written: Mutex<Vec<DayPayload>>,
        stored: Mutex<HashMap<DayKey, DayPayload>>,
        reads_fail: bool,
        deletes_fail: bool,
    }

    impl FakeRemoteDayStore {
        /// `true` entries fail the matching write call; later calls succeed.
        fn with_write_failures(failures: Vec<bool>) -> Self {
            Self {
                write_failures: Mutex::new(failures.into()),
                ..Self::default()
            }
        }

        fn written_days(&self) -> Vec<String> {
            self.written
                .lock()
                .expect("written lock poisoned")
                .iter()
                .map(|payload| payload.day.to_string())
                .collect()
        }
    }

    #[async_trait]
    impl RemoteDayStore for FakeRemoteDayStore {
        async fn read(&self, day_key: DayKey) -> Result<Option<DayPayload>, InfraError> {
            if self.reads_fail {
                return Err(InfraError::Remote("network down".to_string()));
            }
            Ok(self.stored.lock().expect("stored lock poisoned").get(&day_key).cloned())
        }

        async fn write(&self, day_key: DayKey, payload: &DayPayload) -> Result<(), InfraError> {
            let fail = self
                .write_failures
                .lock()
                .expect("failure lock poisoned")
                .pop_front()
                .unwrap_or(false);
            if fail {
                return Err(InfraError::Remote("network down".to_string()));
            }
            self.written.lock().expect("written lock poisoned").push(payload.clone());
            self.stored
                .lock()
                .expect("stored lock poisoned")
                .insert(day_key, payload.clone());
            Ok(())
        }

        async fn delete(&self, target: DeleteTarget) -> Result<(), InfraError> {
            if self.deletes_fail {
                return Err(InfraError::Remote("http 403".to_string()));
            }
            let mut stored = self.stored.lock().expect("stored lock poisoned");
            match target {
                DeleteTarget::Day(day_key) => {
                    stored.remove(&day_key);
                }
                DeleteTarget::All => stored.clear(),
            }
            Ok(())
        }
    }

    type TestService = DaySyncService<FakeRemoteDayStore, InMemoryKvStore, InMemorySyncStateRepository>;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn ticking_clock() -> NowProvider {
        let base = fixed_time("2026-03-09T10:00:00Z");
        let ticks = Arc::new(AtomicI64::new(0));
        Arc::new(move || base + Duration::seconds(ticks.fetch_add(1, Ordering::SeqCst)))
    }

    fn service(remote: FakeRemoteDayStore) -> (TestService, Arc<FakeRemoteDayStore>) {
        let remote = Arc::new(remote);
        let service = DaySyncService::new(
            remote.clone(),
            Arc::new(InMemoryKvStore::default()),
            Arc::new(InMemorySyncStateRepository::default()),
        )
        .with_now_provider(ticking_clock());
        (service, remote)
    }

    fn record(day: &str, category_id: &str) -> DayRecord {
        let mut record = DayRecord::empty(DayKey::parse(day).expect("day key"));
        record.blocks = vec![Block {
            id: format!("blk-{day}"),
            start: 60.0,
            dur: 30.0,
            category_id: category_id.to_string(),
        }];
        record
    }

    fn day(value: &str) -> DayKey {
        DayKey::parse(value).expect("day key")
    }

    #[tokio::test]
    async fn save_delivers_and_records_last_synced() {
        let (service, remote) = service(FakeRemoteDayStore::default());

        let outcome = service.save("u1", &record("2026-03-09", "study")).await.expect("save");

        assert_eq!(outcome, SaveOutcome::Synced);
        assert!(service.pending("u1").expect("pending").is_empty());
        assert_eq!(remote.written_days(), vec!["2026-03-09"]);
        assert!(service.last_synced("u1").expect("last synced").is_some());
    }

    #[tokio::test]
    async fn failed_save_is_queued_and_delivered_on_next_flush() {
        let (service, remote) = service(FakeRemoteDayStore::with_write_failures(vec![true]));

        let outcome = service.save("u1", &record("2026-03-09", "study")).await.expect("save");
        assert_eq!(outcome, SaveOutcome::Queued);
        assert_eq!(service.pending("u1").expect("pending").len(), 1);
        assert!(service.last_synced("u1").expect("last synced").is_none());

        let report = service.flush("u1").await.expect("flush");
        assert_eq!(report.delivered, vec![day("2026-03-09")]);
        assert_eq!(report.remaining, 0);
        assert_eq!(remote.written_days(), vec!["2026-03-09"]);
    }

    #[tokio::test]
    async fn flush_is_ordered_and_stops_at_first_failure() {
        let (service, remote) = service(FakeRemoteDayStore::with_write_failures(vec![false, true]));
        service.enqueue("u1", &record("2026-03-09", "a")).expect("enqueue");
        service.enqueue("u1", &record("2026-03-07", "b")).expect("enqueue");
        service.enqueue("u1", &record("2026-03-08", "c")).expect("enqueue");

        let report = service.flush("u1").await.expect("flush");

        assert_eq!(report.delivered, vec![day("2026-03-09")]);
        assert_eq!(report.remaining, 2);
        assert!(report.failure.is_some());
        assert_eq!(remote.written_days(), vec!["2026-03-09"]);

        let report = service.flush("u1").await.expect("second flush");
        assert_eq!(report.delivered, vec![day("2026-03-07"), day("2026-03-08")]);
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test]
    async fn newer_edit_replaces_queued_write() {
        let (service, remote) = service(FakeRemoteDayStore::with_write_failures(vec![true, true]));
        service.save("u1", &record("2026-03-09", "old")).await.expect("save");
        service.save("u1", &record("2026-03-09", "new")).await.expect("save");

        let pending = service.pending("u1").expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.blocks[0].category_id, "new");

        service.flush("u1").await.expect("flush");
        let written = remote.written.lock().expect("written lock poisoned");
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].blocks[0].category_id, "new");
    }

    #[tokio::test]
    async fn padded_user_id_is_flushed_and_tracked_as_the_same_user() {
        let (service, remote) = service(FakeRemoteDayStore::with_write_failures(vec![true]));
        service.save(" u1 ", &record("2026-03-09", "study")).await.expect("save");

        let report = service.flush(" u1 ").await.expect("flush");

        assert_eq!(report.delivered, vec![day("2026-03-09")]);
        assert_eq!(remote.written_days(), vec!["2026-03-09"]);
        assert!(service.last_synced("u1").expect("last synced").is_some());
        assert!(service.pending("u1 ").expect("pending").is_empty());
    }

    #[tokio::test]
    async fn load_prefers_queued_copy_over_remote() {
        let (service, remote) = service(FakeRemoteDayStore::with_write_failures(vec![false, true]));
        service.save("u1", &record("2026-03-09", "remote")).await.expect("save");
        service.save("u1", &record("2026-03-09", "local")).await.expect("save");
        assert!(remote.stored.lock().expect("stored lock").contains_key(&day("2026-03-09")));

        let loaded = service.load("u1", day("2026-03-09")).await.expect("load");
        assert_eq!(loaded.blocks[0].category_id, "local");
    }

    #[tokio::test]
    async fn load_degrades_to_empty_record_when_remote_fails() {
        let (service, _remote) = service(FakeRemoteDayStore {
            reads_fail: true,
            ..FakeRemoteDayStore::default()
        });

        let loaded = service.load("u1", day("2026-03-09")).await.expect("load");
        assert_eq!(loaded, DayRecord::empty(day("2026-03-09")));
    }

    #[tokio::test]
    async fn rejected_delete_is_surfaced_and_never_queued() {
        let (service, _remote) = service(FakeRemoteDayStore {
            deletes_fail: true,
            write_failures: Mutex::new(VecDeque::from(vec![true])),
            ..FakeRemoteDayStore::default()
        });
        service.save("u1", &record("2026-03-09", "study")).await.expect("save");

        let result = service.delete("u1", DeleteTarget::Day(day("2026-03-09"))).await;

        assert!(matches!(result, Err(InfraError::DeleteRejected(_))));
        let pending = service.pending("u1").expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.blocks.len(), 1);
    }

    #[tokio::test]
    async fn confirmed_delete_drops_matching_queued_writes() {
        let (service, remote) = service(FakeRemoteDayStore::with_write_failures(vec![true, true, true]));
        service.save("u1", &record("2026-03-09", "a")).await.expect("save");
        service.save("u1", &record("2026-03-10", "b")).await.expect("save");

        let dropped = service
            .delete("u1", DeleteTarget::Day(day("2026-03-09")))
            .await
            .expect("delete day");
        assert_eq!(dropped, 1);
        assert_eq!(service.pending("u1").expect("pending").len(), 1);

        let dropped = service.delete("u1", DeleteTarget::All).await.expect("delete all");
        assert_eq!(dropped, 1);
        service.flush("u1").await.expect("flush");
        assert!(remote.written_days().is_empty());
    }
}
