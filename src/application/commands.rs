use crate::application::autosave::{SaveDebouncer, Ticker, TimerTick};
use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::day_board::{DayBoard, Tool};
use crate::application::day_sync::{DaySyncService, SaveOutcome};
use crate::domain::day_clock::{NowProvider, system_now};
use crate::domain::models::{Block, Category, DayKey, DayRecord, TimerSession};
use crate::domain::timer::{StopOutcome, TimerTracker};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::{DurableKv, SqliteKvStore};
use crate::infrastructure::remote_store::{
    DeleteTarget, OfflineRemoteDayStore, RemoteDayStore, ReqwestRemoteDayStore,
};
use crate::infrastructure::sync_state_repository::{SqliteSyncStateRepository, SyncStateRepository};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

const TICK_PERIOD: Duration = Duration::from_secs(1);

type DaySync = DaySyncService<dyn RemoteDayStore, dyn DurableKv, dyn SyncStateRepository>;

fn timer_key(user_id: &str) -> String {
    format!("timer:{user_id}")
}

/// Shared handles that background saves and the ticker need.
#[derive(Clone)]
struct SessionContext {
    user_id: String,
    board: Arc<Mutex<DayBoard>>,
    sync: Arc<DaySync>,
    store: Arc<dyn DurableKv>,
    debouncer: Arc<SaveDebouncer>,
}

impl SessionContext {
    fn lock_board(&self) -> Result<MutexGuard<'_, DayBoard>, InfraError> {
        self.board
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("board lock poisoned: {error}")))
    }

    /// Schedules a debounced save for every edited day.
    fn schedule_saves(&self) {
        let days = match self.lock_board() {
            Ok(board) => board.dirty_days(),
            Err(error) => {
                tracing::error!(%error, "cannot schedule saves");
                return;
            }
        };
        for day_key in days {
            let context = self.clone();
            self.debouncer.schedule(day_key, async move {
                context.save_day(day_key).await;
            });
        }
    }

    async fn save_day(&self, day_key: DayKey) {
        let record = match self.lock_board() {
            Ok(mut board) => board.take_dirty_day(day_key),
            Err(error) => {
                tracing::error!(day = %day_key, %error, "save skipped");
                return;
            }
        };
        let Some(record) = record else {
            return;
        };
        match self.sync.save(&self.user_id, &record).await {
            Ok(SaveOutcome::Synced) => tracing::info!(day = %day_key, "day saved"),
            Ok(SaveOutcome::Queued) => tracing::warn!(day = %day_key, "day queued for later delivery"),
            Err(error) => {
                tracing::error!(day = %day_key, %error, "failed to queue day; kept unsaved");
                self.restore_unsaved(record);
            }
        }
    }

    fn restore_unsaved(&self, record: DayRecord) {
        match self.lock_board() {
            Ok(mut board) => board.restore_dirty(record),
            Err(error) => tracing::error!(day = %record.day_key, %error, "unsaved day lost"),
        }
    }

    /// Enqueues every edited day without attempting delivery. Days that fail
    /// stay dirty; the first failure is returned after all were tried.
    fn enqueue_dirty(&self) -> Result<usize, InfraError> {
        let records = self.lock_board()?.take_dirty();
        let mut enqueued = 0;
        let mut first_error = None;
        for record in records {
            match self.sync.enqueue(&self.user_id, &record) {
                Ok(_) => enqueued += 1,
                Err(error) => {
                    tracing::error!(day = %record.day_key, %error, "failed to queue day; kept unsaved");
                    self.restore_unsaved(record);
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(enqueued),
        }
    }

    fn persist_timer(&self) -> Result<(), InfraError> {
        let session = self.lock_board()?.timer().session().cloned();
        let key = timer_key(&self.user_id);
        match session {
            Some(session) => self.store.put(&key, &serde_json::to_string(&session)?),
            None => self.store.delete(&key).map(|_| ()),
        }
    }

    async fn ensure_loaded(&self, day_key: DayKey) -> Result<(), InfraError> {
        let loaded = self.lock_board()?.loaded(day_key).is_some();
        if loaded {
            return Ok(());
        }
        let record = self.sync.load(&self.user_id, day_key).await?;
        self.lock_board()?.cache_day(record);
        Ok(())
    }

    async fn settle_unsettled(&self) -> Result<(), InfraError> {
        let days = self.lock_board()?.unsettled_days();
        for day_key in days {
            let record = self.sync.load(&self.user_id, day_key).await?;
            self.lock_board()?.cache_day(record);
        }
        Ok(())
    }

    async fn after_timer_change(&self) -> Result<(), InfraError> {
        self.persist_timer()?;
        self.settle_unsettled().await?;
        self.schedule_saves();
        Ok(())
    }

    fn running_day(&self) -> Result<Option<DayKey>, InfraError> {
        Ok(self
            .lock_board()?
            .timer()
            .session()
            .map(|session| session.day_key))
    }

    /// Force-stops a session whose day has ended, before anything else
    /// touches the board. The session is flushed into its own day.
    fn enforce_boundary(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Option<StopOutcome>, InfraError> {
        let outcome = self.lock_board()?.check_boundary(now);
        if outcome.is_some() {
            tracing::info!("timer crossed the day boundary; stopped");
            self.persist_timer()?;
            self.schedule_saves();
            self.spawn_settle();
        }
        Ok(outcome)
    }

    /// Loads days still waiting for a timer block, in the background.
    fn spawn_settle(&self) {
        let waiting = self.lock_board().map(|board| !board.unsettled_days().is_empty());
        if !matches!(waiting, Ok(true)) {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("no runtime; timer block waits until its day is loaded");
            return;
        };
        let context = self.clone();
        runtime.spawn(async move {
            match context.settle_unsettled().await {
                Ok(()) => context.schedule_saves(),
                Err(error) => tracing::error!(%error, "failed to settle timer block"),
            }
        });
    }

    /// One display tick. Ends the ticker once the timer is idle; a session
    /// that crossed the day boundary is stopped and settled first.
    fn tick(&self, now: chrono::DateTime<chrono::Utc>) -> Option<TimerTick> {
        match self.enforce_boundary(now) {
            Ok(None) => {}
            Ok(Some(_)) => return None,
            Err(error) => {
                tracing::error!(%error, "timer tick skipped");
                return None;
            }
        }
        let board = match self.lock_board() {
            Ok(board) => board,
            Err(error) => {
                tracing::error!(%error, "timer tick skipped");
                return None;
            }
        };
        let session = board.timer().session()?.clone();
        Some(TimerTick {
            elapsed_seconds: board.timer().elapsed_seconds(now),
            category_id: Some(session.category_id),
        })
    }
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    config: AppConfig,
    now_provider: NowProvider,
    session: SessionContext,
    ticker: Mutex<Option<Ticker>>,
}

impl AppState {
    /// Opens the workspace with the remote store named in `config/app.json`.
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let remote: Arc<dyn RemoteDayStore> = match bootstrap.config.remote_base_url.as_deref() {
            Some(base_url) => {
                let mut store = ReqwestRemoteDayStore::new(base_url)?;
                if let Some(token) = bootstrap.config.remote_bearer_token.as_deref() {
                    store = store.with_bearer_token(token);
                }
                Arc::new(store)
            }
            None => Arc::new(OfflineRemoteDayStore),
        };
        Self::assemble(bootstrap, remote, system_now())
    }

    pub fn with_remote(
        workspace_root: PathBuf,
        remote: Arc<dyn RemoteDayStore>,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Self::assemble(bootstrap, remote, now_provider)
    }

    fn assemble(
        bootstrap: BootstrapResult,
        remote: Arc<dyn RemoteDayStore>,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let config = bootstrap.config;
        let boundary = config.day_boundary()?;
        let store: Arc<dyn DurableKv> = Arc::new(SqliteKvStore::new(&bootstrap.database_path));
        let sync_state: Arc<dyn SyncStateRepository> =
            Arc::new(SqliteSyncStateRepository::new(&bootstrap.database_path));
        let sync: Arc<DaySync> = Arc::new(
            DaySyncService::new(remote, store.clone(), sync_state).with_now_provider(now_provider.clone()),
        );

        let now = now_provider();
        let cached = read_cached_session(store.as_ref(), &config.user_id)?;
        let timer = TimerTracker::rehydrate(boundary, cached.clone(), now);
        if cached.is_some() && !timer.is_running() {
            store.delete(&timer_key(&config.user_id))?;
            tracing::info!("discarded timer session from an earlier day");
        }

        let today = boundary.day_key_of(now);
        let record = sync
            .load_local(&config.user_id, today)?
            .unwrap_or_else(|| DayRecord::empty(today));
        let board = DayBoard::new(boundary, bootstrap.palette, record, timer);

        let state = Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            session: SessionContext {
                user_id: config.user_id.clone(),
                board: Arc::new(Mutex::new(board)),
                sync,
                store,
                debouncer: Arc::new(SaveDebouncer::new(Duration::from_millis(config.save_debounce_ms))),
            },
            config,
            now_provider,
            ticker: Mutex::new(None),
        };
        state.sync_ticker()?;
        Ok(state)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        tracing::error!(command, %error, "command failed");
        error.to_string()
    }

    /// Live elapsed-time updates while the timer runs.
    pub fn timer_updates(&self) -> Option<watch::Receiver<TimerTick>> {
        let ticker = self.ticker.lock().ok()?;
        ticker.as_ref().filter(|ticker| ticker.is_running()).map(Ticker::subscribe)
    }

    /// Enqueues every unsaved day, then stops the ticker and pending saves.
    pub fn shutdown(&self) -> Result<usize, InfraError> {
        let enqueued = self.session.enqueue_dirty()?;
        self.session.persist_timer()?;
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(ticker) = ticker.take() {
                ticker.stop();
            }
        }
        let cancelled = self.session.debouncer.cancel_all();
        tracing::info!(enqueued, cancelled, "session shut down");
        Ok(enqueued)
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        (self.now_provider)()
    }

    /// Starts or stops the display ticker to match the timer state.
    fn sync_ticker(&self) -> Result<(), InfraError> {
        let running = lock_board(self)?.timer().is_running();
        let mut ticker = self
            .ticker
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("ticker lock poisoned: {error}")))?;
        if !running {
            if let Some(ticker) = ticker.take() {
                ticker.stop();
            }
            return Ok(());
        }
        if ticker.as_ref().is_some_and(Ticker::is_running) {
            return Ok(());
        }
        if Handle::try_current().is_err() {
            tracing::debug!("no runtime; timer ticker starts with the first async command");
            return Ok(());
        }
        let context = self.session.clone();
        let now_provider = self.now_provider.clone();
        *ticker = Some(Ticker::spawn(TICK_PERIOD, move || context.tick(now_provider())));
        Ok(())
    }
}

fn read_cached_session(store: &dyn DurableKv, user_id: &str) -> Result<Option<TimerSession>, InfraError> {
    let Some(raw) = store.get(&timer_key(user_id))? else {
        return Ok(None);
    };
    match serde_json::from_str::<TimerSession>(&raw) {
        Ok(session) => Ok(Some(session)),
        Err(error) => {
            tracing::warn!(%error, "ignoring unreadable cached timer session");
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerStateResponse {
    pub running: bool,
    pub category_id: Option<String>,
    pub day_key: Option<String>,
    pub started_at: Option<String>,
    pub elapsed_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StopTimerResponse {
    pub outcome: String,
    pub elapsed_seconds: i64,
    pub day_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayViewResponse {
    pub day_key: String,
    pub blocks: Vec<Block>,
    pub notes_by_category: BTreeMap<String, String>,
    pub notes_by_block: BTreeMap<String, String>,
    pub tracked_seconds: BTreeMap<String, f64>,
    pub palette: Vec<Category>,
    pub active_category: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub timer: TimerStateResponse,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlushResponse {
    pub delivered: Vec<String>,
    pub remaining: usize,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncStatusResponse {
    pub pending_days: Vec<String>,
    pub last_synced_at: Option<String>,
}

pub async fn open_day_impl(state: &AppState, day: Option<String>) -> Result<DayViewResponse, InfraError> {
    settle_boundary_loaded(state).await?;
    let day_key = match day.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_day(value)?,
        None => lock_board(state)?.boundary().day_key_of(state.now()),
    };
    let record = state.session.sync.load(state.user_id(), day_key).await?;
    lock_board(state)?.switch_day(record);
    state.sync_ticker()?;
    tracing::info!(day = %day_key, "opened day");
    day_view_impl(state)
}

pub fn day_view_impl(state: &AppState) -> Result<DayViewResponse, InfraError> {
    let now = state.now();
    let board = lock_board(state)?;
    let record = board.record();
    Ok(DayViewResponse {
        day_key: record.day_key.to_string(),
        blocks: record.blocks.clone(),
        notes_by_category: record.notes_by_category.clone(),
        notes_by_block: record.notes_by_block.clone(),
        tracked_seconds: board.tracked_seconds(),
        palette: board.palette().to_vec(),
        active_category: match board.tool() {
            Tool::Paint(category_id) => Some(category_id.clone()),
            Tool::Erase => None,
        },
        can_undo: board.can_undo(),
        can_redo: board.can_redo(),
        timer: to_timer_state_response(&board, now),
    })
}

pub fn list_blocks_impl(state: &AppState) -> Result<Vec<Block>, InfraError> {
    Ok(lock_board(state)?.blocks().to_vec())
}

/// Selects the paint category, or the eraser when `category_id` is `None`.
pub fn set_tool_impl(state: &AppState, category_id: Option<String>) -> Result<(), InfraError> {
    let tool = match category_id {
        Some(category_id) => Tool::Paint(category_id),
        None => Tool::Erase,
    };
    settle_boundary(state)?;
    lock_board(state)?.set_tool(tool)
}

pub fn paint_impl(
    state: &AppState,
    start_minute: f64,
    end_minute: f64,
    category_id: String,
) -> Result<Vec<Block>, InfraError> {
    mutate(state, "paint", |board| board.paint(start_minute, end_minute, &category_id))
}

pub fn erase_impl(state: &AppState, start_minute: f64, end_minute: f64) -> Result<Vec<Block>, InfraError> {
    mutate(state, "erase", |board| board.erase(start_minute, end_minute))
}

pub fn pointer_down_impl(state: &AppState, cell: usize) -> Result<(), InfraError> {
    settle_boundary(state)?;
    lock_board(state)?.pointer_down(cell);
    Ok(())
}

pub fn pointer_move_impl(state: &AppState, cell: usize) -> Result<(), InfraError> {
    lock_board(state)?.pointer_move(cell);
    Ok(())
}

pub fn pointer_up_impl(state: &AppState, cell: Option<usize>) -> Result<Vec<Block>, InfraError> {
    mutate(state, "pointer_up", |board| board.pointer_up(cell))
}

pub fn cancel_gesture_impl(state: &AppState) -> Result<(), InfraError> {
    lock_board(state)?.cancel_gesture();
    Ok(())
}

pub fn undo_impl(state: &AppState) -> Result<Vec<Block>, InfraError> {
    mutate(state, "undo", |board| Ok(board.undo()))
}

pub fn redo_impl(state: &AppState) -> Result<Vec<Block>, InfraError> {
    mutate(state, "redo", |board| Ok(board.redo()))
}

pub async fn start_timer_impl(state: &AppState, category_id: String) -> Result<TimerStateResponse, InfraError> {
    if let Some(day_key) = state.session.running_day()? {
        state.session.ensure_loaded(day_key).await?;
    }
    let now = state.now();
    let previous = lock_board(state)?.start_timer(&category_id, now)?;
    if let Some(outcome) = previous.as_ref() {
        tracing::info!(outcome = %to_stop_response(outcome).outcome, "previous timer stopped");
    }
    state.session.after_timer_change().await?;
    state.sync_ticker()?;
    tracing::info!(category = %category_id.trim(), "timer started");
    timer_state_impl(state)
}

pub async fn stop_timer_impl(state: &AppState) -> Result<StopTimerResponse, InfraError> {
    if let Some(day_key) = state.session.running_day()? {
        state.session.ensure_loaded(day_key).await?;
    }
    let outcome = lock_board(state)?.stop_timer(state.now());
    state.session.after_timer_change().await?;
    state.sync_ticker()?;
    let response = to_stop_response(&outcome);
    tracing::info!(outcome = %response.outcome, elapsed_seconds = response.elapsed_seconds, "timer stopped");
    Ok(response)
}

pub fn timer_state_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let now = state.now();
    let board = lock_board(state)?;
    Ok(to_timer_state_response(&board, now))
}

/// Stops a session whose day has ended. Normally driven by the ticker.
pub async fn check_boundary_impl(state: &AppState) -> Result<Option<StopTimerResponse>, InfraError> {
    if let Some(day_key) = state.session.running_day()? {
        state.session.ensure_loaded(day_key).await?;
    }
    let outcome = lock_board(state)?.check_boundary(state.now());
    let Some(outcome) = outcome else {
        return Ok(None);
    };
    state.session.after_timer_change().await?;
    state.sync_ticker()?;
    Ok(Some(to_stop_response(&outcome)))
}

pub fn set_category_note_impl(state: &AppState, category_id: String, text: String) -> Result<(), InfraError> {
    settle_boundary(state)?;
    lock_board(state)?.set_category_note(&category_id, &text)?;
    state.session.schedule_saves();
    Ok(())
}

pub fn set_block_note_impl(state: &AppState, block_id: String, text: String) -> Result<(), InfraError> {
    settle_boundary(state)?;
    lock_board(state)?.set_block_note(&block_id, &text)?;
    state.session.schedule_saves();
    Ok(())
}

pub fn tracked_seconds_impl(state: &AppState) -> Result<BTreeMap<String, f64>, InfraError> {
    Ok(lock_board(state)?.tracked_seconds())
}

/// Enqueues unsaved days and delivers the queue now.
pub async fn flush_pending_impl(state: &AppState) -> Result<FlushResponse, InfraError> {
    state.session.enqueue_dirty()?;
    let report = state.session.sync.flush(state.user_id()).await?;
    tracing::info!(
        delivered = report.delivered.len(),
        remaining = report.remaining,
        "flushed pending writes"
    );
    Ok(FlushResponse {
        delivered: report.delivered.iter().map(ToString::to_string).collect(),
        remaining: report.remaining,
        failure: report.failure,
    })
}

pub fn sync_status_impl(state: &AppState) -> Result<SyncStatusResponse, InfraError> {
    let pending_days = state
        .session
        .sync
        .pending(state.user_id())?
        .into_iter()
        .map(|entry| entry.day_key.to_string())
        .collect();
    Ok(SyncStatusResponse {
        pending_days,
        last_synced_at: state
            .session
            .sync
            .last_synced(state.user_id())?
            .map(|value| value.to_rfc3339()),
    })
}

/// Deletes one day remotely. A rejection is returned to the caller and the
/// local record is left as it was.
pub async fn delete_day_impl(state: &AppState, day: String) -> Result<usize, InfraError> {
    let day_key = parse_day(&day)?;
    settle_boundary_loaded(state).await?;
    state.session.debouncer.cancel(day_key);
    match state
        .session
        .sync
        .delete(state.user_id(), DeleteTarget::Day(day_key))
        .await
    {
        Ok(dropped) => {
            lock_board(state)?.reset_day(day_key);
            tracing::info!(day = %day_key, dropped, "day deleted");
            Ok(dropped)
        }
        Err(error) => {
            state.session.schedule_saves();
            Err(error)
        }
    }
}

pub async fn delete_all_days_impl(state: &AppState) -> Result<usize, InfraError> {
    settle_boundary_loaded(state).await?;
    state.session.debouncer.cancel_all();
    match state.session.sync.delete(state.user_id(), DeleteTarget::All).await {
        Ok(dropped) => {
            lock_board(state)?.reset_all();
            tracing::info!(dropped, "all days deleted");
            Ok(dropped)
        }
        Err(error) => {
            state.session.schedule_saves();
            Err(error)
        }
    }
}

fn mutate<F>(state: &AppState, command: &str, operation: F) -> Result<Vec<Block>, InfraError>
where
    F: FnOnce(&mut DayBoard) -> Result<bool, InfraError>,
{
    settle_boundary(state)?;
    let (changed, blocks) = {
        let mut board = lock_board(state)?;
        let changed = operation(&mut *board)?;
        (changed, board.blocks().to_vec())
    };
    if changed {
        tracing::debug!(command, blocks = blocks.len(), "block list changed");
        state.session.schedule_saves();
    }
    Ok(blocks)
}

/// Stops a session whose day has ended before a command changes the board,
/// and starts the ticker for a session restored without one.
fn settle_boundary(state: &AppState) -> Result<(), InfraError> {
    state.session.enforce_boundary(state.now())?;
    state.sync_ticker()
}

async fn settle_boundary_loaded(state: &AppState) -> Result<(), InfraError> {
    if let Some(day_key) = state.session.running_day()? {
        state.session.ensure_loaded(day_key).await?;
    }
    settle_boundary(state)
}

fn lock_board(state: &AppState) -> Result<MutexGuard<'_, DayBoard>, InfraError> {
    state.session.lock_board()
}

fn parse_day(value: &str) -> Result<DayKey, InfraError> {
    DayKey::parse(value.trim()).map_err(InfraError::InvalidInput)
}

fn to_timer_state_response(board: &DayBoard, now: chrono::DateTime<chrono::Utc>) -> TimerStateResponse {
    let session = board.timer().session();
    TimerStateResponse {
        running: session.is_some(),
        category_id: session.map(|session| session.category_id.clone()),
        day_key: session.map(|session| session.day_key.to_string()),
        started_at: session.map(|session| session.started_at.to_rfc3339()),
        elapsed_seconds: board.timer().elapsed_seconds(now),
    }
}

fn to_stop_response(outcome: &StopOutcome) -> StopTimerResponse {
    match outcome {
        StopOutcome::Idle => StopTimerResponse {
            outcome: "idle".to_string(),
            elapsed_seconds: 0,
            day_key: None,
        },
        StopOutcome::Discarded {
            session,
            elapsed_seconds,
        } => StopTimerResponse {
            outcome: "discarded".to_string(),
            elapsed_seconds: *elapsed_seconds,
            day_key: Some(session.day_key.to_string()),
        },
        StopOutcome::Finished(finished) => StopTimerResponse {
            outcome: "saved".to_string(),
            elapsed_seconds: finished.elapsed_seconds,
            day_key: Some(finished.session.day_key.to_string()),
        },
    }
}
