use crate::domain::day_clock::DayBoundary;
use crate::domain::interval::{TIMER_JOIN_GAP_MINUTES, apply_block, merge_near_same_category};
use crate::domain::models::{Block, DAY_MINUTES, NewBlock, TimerSession};
use chrono::{DateTime, Utc};

/// Sessions shorter than this are treated as accidental taps.
pub const MIN_SAVE_SECONDS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running(TimerSession),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Nothing was running.
    Idle,
    Discarded {
        session: TimerSession,
        elapsed_seconds: i64,
    },
    Finished(FinishedSession),
}

impl StopOutcome {
    pub fn finished(&self) -> Option<&FinishedSession> {
        match self {
            Self::Finished(finished) => Some(finished),
            _ => None,
        }
    }
}

/// A stopped session long enough to become a block in its own day.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSession {
    pub session: TimerSession,
    pub start_minute: f64,
    pub elapsed_seconds: i64,
}

impl FinishedSession {
    pub fn to_block(&self) -> NewBlock {
        let dur = (self.elapsed_seconds as f64 / 60.0).min(DAY_MINUTES - self.start_minute);
        NewBlock::new(self.start_minute, dur.max(0.0), self.session.category_id.clone())
    }

    /// Applies the session to the block list of the day it started in.
    pub fn settle(&self, day_blocks: &[Block]) -> Vec<Block> {
        let applied = apply_block(day_blocks, &self.to_block());
        merge_near_same_category(&applied, TIMER_JOIN_GAP_MINUTES)
    }
}

#[derive(Debug, Clone)]
pub struct TimerTracker {
    boundary: DayBoundary,
    state: TimerState,
}

impl TimerTracker {
    pub fn new(boundary: DayBoundary) -> Self {
        Self {
            boundary,
            state: TimerState::Idle,
        }
    }

    /// Restores a cached session. A session from another day is dropped.
    pub fn rehydrate(boundary: DayBoundary, cached: Option<TimerSession>, now: DateTime<Utc>) -> Self {
        let mut tracker = Self::new(boundary);
        if let Some(session) = cached {
            if session.validate().is_ok()
                && session.started_at <= now
                && session.day_key == boundary.day_key_of(now)
            {
                tracker.state = TimerState::Running(session);
            }
        }
        tracker
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn session(&self) -> Option<&TimerSession> {
        match &self.state {
            TimerState::Running(session) => Some(session),
            TimerState::Idle => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running(_))
    }

    /// Starts tracking `category_id`. A session on another category is
    /// stopped and flushed first; its outcome is returned.
    pub fn start(&mut self, category_id: &str, now: DateTime<Utc>) -> Result<Option<StopOutcome>, String> {
        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err("timer category_id must not be empty".to_string());
        }

        let mut previous = self.check_boundary(now);
        if let Some(session) = self.session() {
            if session.category_id == category_id {
                return Ok(previous);
            }
            previous = Some(self.stop(now, true));
        }

        self.state = TimerState::Running(TimerSession {
            category_id: category_id.to_string(),
            day_key: self.boundary.day_key_of(now),
            started_at: now,
        });
        Ok(previous)
    }

    pub fn stop(&mut self, now: DateTime<Utc>, flush: bool) -> StopOutcome {
        let TimerState::Running(session) = std::mem::replace(&mut self.state, TimerState::Idle) else {
            return StopOutcome::Idle;
        };

        let start_second = self.second_of_day(&session, session.started_at);
        let elapsed_seconds = (self.second_of_day(&session, now) - start_second).max(0);
        if !flush || elapsed_seconds < MIN_SAVE_SECONDS {
            return StopOutcome::Discarded {
                session,
                elapsed_seconds,
            };
        }

        let since_start = self
            .boundary
            .minutes_since_start(session.day_key, session.started_at)
            .max(0.0);
        // a fall-back day runs past 1440 minutes; sessions in the extra hour end the grid
        let start_minute = if since_start >= DAY_MINUTES {
            (DAY_MINUTES - elapsed_seconds as f64 / 60.0).max(0.0)
        } else {
            since_start
        };
        StopOutcome::Finished(FinishedSession {
            start_minute: (start_minute * 60.0).round() / 60.0,
            elapsed_seconds,
            session,
        })
    }

    /// Force-stops a session once wall-clock time has left its day.
    pub fn check_boundary(&mut self, now: DateTime<Utc>) -> Option<StopOutcome> {
        let crossed = self
            .session()
            .is_some_and(|session| self.boundary.day_key_of(now) != session.day_key);
        crossed.then(|| self.stop(now, true))
    }

    /// Elapsed whole seconds for display. Never changes state.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.session().map(|session| {
            (self.second_of_day(session, now) - self.second_of_day(session, session.started_at)).max(0)
        })
    }

    fn second_of_day(&self, session: &TimerSession, instant: DateTime<Utc>) -> i64 {
        (self.boundary.minutes_since_start(session.day_key, instant) * 60.0).round() as i64
    }
}
