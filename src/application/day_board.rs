use crate::domain::day_clock::DayBoundary;
use crate::domain::gesture::{CellGeometry, GestureState, GestureTracker, Selection};
use crate::domain::history::History;
use crate::domain::interval::{apply_block, remove_range, snap_selection};
use crate::domain::models::{Block, Category, DayKey, DayRecord, NewBlock, validate_block_list};
use crate::domain::timer::{FinishedSession, StopOutcome, TimerTracker};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    Paint(String),
    Erase,
}

/// The viewed day's block list together with everything that mutates it:
/// undo history, the auto-track timer and the pointer gesture.
///
/// Records of other days are kept while they hold unsaved edits or belong
/// to the running timer session.
#[derive(Debug)]
pub struct DayBoard {
    boundary: DayBoundary,
    palette: Vec<Category>,
    current: DayRecord,
    others: BTreeMap<DayKey, DayRecord>,
    unsettled: Vec<FinishedSession>,
    history: History<Vec<Block>>,
    timer: TimerTracker,
    gesture: GestureTracker,
    tool: Tool,
    dirty: BTreeSet<DayKey>,
}

impl DayBoard {
    pub fn new(boundary: DayBoundary, palette: Vec<Category>, record: DayRecord, timer: TimerTracker) -> Self {
        let tool = palette
            .first()
            .map(|category| Tool::Paint(category.id.clone()))
            .unwrap_or(Tool::Erase);
        Self {
            boundary,
            palette,
            current: record,
            others: BTreeMap::new(),
            unsettled: Vec::new(),
            history: History::default(),
            timer,
            gesture: GestureTracker::default(),
            tool,
            dirty: BTreeSet::new(),
        }
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    pub fn palette(&self) -> &[Category] {
        &self.palette
    }

    pub fn current_day(&self) -> DayKey {
        self.current.day_key
    }

    pub fn record(&self) -> &DayRecord {
        &self.current
    }

    pub fn blocks(&self) -> &[Block] {
        &self.current.blocks
    }

    pub fn loaded(&self, day_key: DayKey) -> Option<&DayRecord> {
        if self.current.day_key == day_key {
            return Some(&self.current);
        }
        self.others.get(&day_key)
    }

    pub fn is_dirty(&self, day_key: DayKey) -> bool {
        self.dirty.contains(&day_key)
    }

    /// Makes a freshly loaded record available without viewing it. A copy
    /// that already holds local edits is kept.
    pub fn cache_day(&mut self, record: DayRecord) {
        let day_key = record.day_key;
        if self.loaded(day_key).is_some() && self.is_dirty(day_key) {
            return;
        }
        if day_key == self.current.day_key {
            return;
        }
        self.others.insert(day_key, record);
        self.apply_unsettled(day_key);
    }

    /// Views another day. Any in-flight gesture is cancelled and history is
    /// cleared, since snapshots belong to the day they were taken on.
    /// Re-opening the shown day refreshes it unless it has unsaved edits.
    pub fn switch_day(&mut self, record: DayRecord) {
        self.gesture.cancel();
        let day_key = record.day_key;
        if day_key == self.current.day_key {
            if !self.dirty.contains(&day_key) && record != self.current {
                self.history.clear();
                self.current = record;
            }
            return;
        }
        self.history.clear();

        let next = match self.others.remove(&day_key) {
            Some(cached) if self.dirty.contains(&day_key) => cached,
            _ => record,
        };
        let previous = std::mem::replace(&mut self.current, next);
        if self.dirty.contains(&previous.day_key) || self.timer_day() == Some(previous.day_key) {
            self.others.insert(previous.day_key, previous);
        }
        self.apply_unsettled(day_key);
        tracing::debug!(day = %day_key, "switched viewed day");
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) -> Result<(), InfraError> {
        self.tool = match tool {
            Tool::Paint(category_id) => Tool::Paint(self.known_category(&category_id)?),
            Tool::Erase => Tool::Erase,
        };
        Ok(())
    }

    /// Paints a raw minute range, snapped to the grid. Returns whether the
    /// block list changed.
    pub fn paint(&mut self, raw_start: f64, raw_end: f64, category_id: &str) -> Result<bool, InfraError> {
        let category_id = self.known_category(category_id)?;
        let (start, dur) = snap_selection(raw_start, raw_end);
        let next = apply_block(&self.current.blocks, &NewBlock::new(start, dur, category_id));
        self.commit(next)
    }

    pub fn erase(&mut self, raw_start: f64, raw_end: f64) -> Result<bool, InfraError> {
        let (start, dur) = snap_selection(raw_start, raw_end);
        let next = remove_range(&self.current.blocks, start, dur);
        self.commit(next)
    }

    pub fn gesture_state(&self) -> GestureState {
        self.gesture.state()
    }

    pub fn pointer_down(&mut self, cell: usize) {
        self.gesture.pointer_down(self.current.day_key, cell);
    }

    pub fn pointer_move(&mut self, cell: usize) {
        self.gesture.pointer_move(cell);
    }

    pub fn pointer_up(&mut self, cell: Option<usize>) -> Result<bool, InfraError> {
        match self.gesture.pointer_up(cell) {
            Some(selection) => self.commit_selection(selection),
            None => Ok(false),
        }
    }

    pub fn pointer_down_at(&mut self, geometry: &impl CellGeometry, x: f64, y: f64) {
        self.gesture.pointer_down_at(geometry, self.current.day_key, x, y);
    }

    pub fn pointer_move_at(&mut self, geometry: &impl CellGeometry, x: f64, y: f64) {
        self.gesture.pointer_move_at(geometry, x, y);
    }

    pub fn pointer_up_at(&mut self, geometry: &impl CellGeometry, x: f64, y: f64) -> Result<bool, InfraError> {
        match self.gesture.pointer_up_at(geometry, x, y) {
            Some(selection) => self.commit_selection(selection),
            None => Ok(false),
        }
    }

    pub fn cancel_gesture(&mut self) {
        self.gesture.cancel();
    }

    /// Applies a finished selection with the active tool. A selection made on
    /// another day is rejected.
    pub fn commit_selection(&mut self, selection: Selection) -> Result<bool, InfraError> {
        if selection.day_key != self.current.day_key {
            return Err(InfraError::InvalidInput(format!(
                "selection was made on {} but {} is shown",
                selection.day_key, self.current.day_key
            )));
        }
        let (start, dur) = selection.minutes();
        let next = match &self.tool {
            Tool::Paint(category_id) => {
                apply_block(&self.current.blocks, &NewBlock::new(start, dur, category_id.clone()))
            }
            Tool::Erase => remove_range(&self.current.blocks, start, dur),
        };
        self.commit(next)
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo(self.current.blocks.clone()) else {
            return false;
        };
        self.current.blocks = previous;
        self.mark_dirty(self.current.day_key);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo(self.current.blocks.clone()) else {
            return false;
        };
        self.current.blocks = next;
        self.mark_dirty(self.current.day_key);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn timer(&self) -> &TimerTracker {
        &self.timer
    }

    /// Starts the timer. A session that is stopped on the way is settled into
    /// its own day and returned.
    pub fn start_timer(&mut self, category_id: &str, now: DateTime<Utc>) -> Result<Option<StopOutcome>, InfraError> {
        let category_id = self.known_category(category_id)?;
        let previous = self
            .timer
            .start(&category_id, now)
            .map_err(InfraError::InvalidInput)?;
        if let Some(outcome) = previous.as_ref() {
            self.settle(outcome);
        }
        Ok(previous)
    }

    pub fn stop_timer(&mut self, now: DateTime<Utc>) -> StopOutcome {
        let outcome = self.timer.stop(now, true);
        self.settle(&outcome);
        outcome
    }

    pub fn check_boundary(&mut self, now: DateTime<Utc>) -> Option<StopOutcome> {
        let outcome = self.timer.check_boundary(now)?;
        self.settle(&outcome);
        Some(outcome)
    }

    /// Days holding a finished session that could not be applied because the
    /// day is not loaded.
    pub fn unsettled_days(&self) -> Vec<DayKey> {
        let days: BTreeSet<DayKey> = self
            .unsettled
            .iter()
            .map(|finished| finished.session.day_key)
            .collect();
        days.into_iter().collect()
    }

    /// Sets or clears (empty text) the note for a category.
    pub fn set_category_note(&mut self, category_id: &str, text: &str) -> Result<(), InfraError> {
        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err(InfraError::InvalidInput("category_id must not be empty".to_string()));
        }
        let changed = set_note(&mut self.current.notes_by_category, category_id, text);
        if changed {
            self.mark_dirty(self.current.day_key);
        }
        Ok(())
    }

    pub fn set_block_note(&mut self, block_id: &str, text: &str) -> Result<(), InfraError> {
        let block_id = block_id.trim();
        if !self.current.blocks.iter().any(|block| block.id == block_id) {
            return Err(InfraError::InvalidInput(format!("block not found: {block_id}")));
        }
        let changed = set_note(&mut self.current.notes_by_block, block_id, text);
        if changed {
            self.mark_dirty(self.current.day_key);
        }
        Ok(())
    }

    pub fn tracked_seconds(&self) -> BTreeMap<String, f64> {
        self.current.tracked_seconds_by_category()
    }

    /// Forgets a day after the remote copy was deleted.
    pub fn reset_day(&mut self, day_key: DayKey) {
        self.others.remove(&day_key);
        self.dirty.remove(&day_key);
        self.unsettled.retain(|finished| finished.session.day_key != day_key);
        if self.current.day_key == day_key {
            self.gesture.cancel();
            self.history.clear();
            self.current = DayRecord::empty(day_key);
        }
    }

    pub fn reset_all(&mut self) {
        self.others.clear();
        self.dirty.clear();
        self.unsettled.clear();
        self.gesture.cancel();
        self.history.clear();
        self.current = DayRecord::empty(self.current.day_key);
    }

    pub fn dirty_days(&self) -> Vec<DayKey> {
        self.dirty.iter().copied().collect()
    }

    /// Hands every edited record to persistence and marks them clean.
    pub fn take_dirty(&mut self) -> Vec<DayRecord> {
        let days = std::mem::take(&mut self.dirty);
        let records = days
            .iter()
            .filter_map(|day_key| self.loaded(*day_key).cloned())
            .collect();
        let timer_day = self.timer_day();
        self.others.retain(|day_key, _| Some(*day_key) == timer_day);
        records
    }

    /// Takes one edited record, if it is dirty.
    pub fn take_dirty_day(&mut self, day_key: DayKey) -> Option<DayRecord> {
        if !self.dirty.remove(&day_key) {
            return None;
        }
        let record = self.loaded(day_key).cloned();
        if day_key != self.current.day_key && self.timer_day() != Some(day_key) {
            self.others.remove(&day_key);
        }
        record
    }

    /// Puts back a record whose persistence failed. A loaded copy is at least
    /// as new and is kept; otherwise `record` is cached again.
    pub fn restore_dirty(&mut self, record: DayRecord) {
        let day_key = record.day_key;
        if self.loaded(day_key).is_none() {
            self.others.insert(day_key, record);
        }
        self.dirty.insert(day_key);
    }

    fn timer_day(&self) -> Option<DayKey> {
        self.timer.session().map(|session| session.day_key)
    }

    fn commit(&mut self, next: Vec<Block>) -> Result<bool, InfraError> {
        validate_block_list(&next).map_err(InfraError::InvalidBlocks)?;
        if next == self.current.blocks {
            return Ok(false);
        }
        let before = std::mem::replace(&mut self.current.blocks, next);
        self.history.record(before);
        self.mark_dirty(self.current.day_key);
        tracing::debug!(day = %self.current.day_key, blocks = self.current.blocks.len(), "committed block list");
        Ok(true)
    }

    fn settle(&mut self, outcome: &StopOutcome) {
        match outcome {
            StopOutcome::Finished(finished) => self.settle_finished(finished.clone()),
            StopOutcome::Discarded {
                session,
                elapsed_seconds,
            } => {
                tracing::info!(category = %session.category_id, elapsed_seconds, "timer session too short; discarded");
            }
            StopOutcome::Idle => {}
        }
    }

    fn settle_finished(&mut self, finished: FinishedSession) {
        let day_key = finished.session.day_key;
        tracing::info!(
            day = %day_key,
            category = %finished.session.category_id,
            elapsed_seconds = finished.elapsed_seconds,
            "settling timer session"
        );
        if day_key == self.current.day_key {
            let next = finished.settle(&self.current.blocks);
            let before = std::mem::replace(&mut self.current.blocks, next);
            self.history.record(before);
            self.mark_dirty(day_key);
        } else if let Some(record) = self.others.get_mut(&day_key) {
            record.blocks = finished.settle(&record.blocks);
            self.mark_dirty(day_key);
        } else {
            self.unsettled.push(finished);
        }
    }

    fn apply_unsettled(&mut self, day_key: DayKey) {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.unsettled)
            .into_iter()
            .partition(|finished| finished.session.day_key == day_key);
        self.unsettled = waiting;
        for finished in ready {
            self.settle_finished(finished);
        }
    }

    fn mark_dirty(&mut self, day_key: DayKey) {
        let palette = self.palette.clone();
        let record = if self.current.day_key == day_key {
            Some(&mut self.current)
        } else {
            self.others.get_mut(&day_key)
        };
        if let Some(record) = record {
            if !palette.is_empty() {
                record.category_snapshot = palette;
            }
            self.dirty.insert(day_key);
        }
    }

    fn known_category(&self, category_id: &str) -> Result<String, InfraError> {
        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err(InfraError::InvalidInput("category_id must not be empty".to_string()));
        }
        if !self.palette.is_empty() && !self.palette.iter().any(|category| category.id == category_id) {
            return Err(InfraError::InvalidInput(format!("unknown category: {category_id}")));
        }
        Ok(category_id.to_string())
    }
}

fn set_note(notes: &mut BTreeMap<String, String>, key: &str, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return notes.remove(key).is_some();
    }
    notes.insert(key.to_string(), text.to_string()).as_deref() != Some(text)
}
