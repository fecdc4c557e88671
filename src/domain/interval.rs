//! Pure interval algebra over a day's block list.
//!
//! Every operation takes the current list by reference and returns a new,
//! sorted, non-overlapping list. Nothing here mutates its input, so callers can
//! snapshot the previous list for undo before applying a change.

use crate::domain::models::{Block, DAY_MINUTES, EPSILON, NewBlock};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const GRID_MINUTES: f64 = 5.0;
pub const MIN_ERASE_REMNANT_MINUTES: f64 = 5.0;
/// Gap under which a restarted timer joins the previous session (10 seconds).
pub const TIMER_JOIN_GAP_MINUTES: f64 = 10.0 / 60.0;

static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_block_id() -> String {
    let sequence = NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed);
    format!("blk-{}-{sequence}", Utc::now().timestamp_micros())
}

pub fn snap_to_grid(raw_minutes: f64) -> f64 {
    (raw_minutes / GRID_MINUTES).round() * GRID_MINUTES
}

/// Snaps a painted selection to the grid and returns `(start, dur)`.
///
/// The selection may be given in either direction. The result always lies in
/// `[0, 1440]` and is at least one grid step long.
pub fn snap_selection(raw_start: f64, raw_end: f64) -> (f64, f64) {
    let (low, high) = if raw_start <= raw_end {
        (raw_start, raw_end)
    } else {
        (raw_end, raw_start)
    };
    let start = snap_to_grid(low).clamp(0.0, DAY_MINUTES - GRID_MINUTES);
    let mut end = snap_to_grid(high).clamp(0.0, DAY_MINUTES);
    if end < start + GRID_MINUTES {
        end = start + GRID_MINUTES;
    }
    (start, end - start)
}

/// Paints `incoming` over `existing`. Whatever it covers is replaced.
pub fn apply_block(existing: &[Block], incoming: &NewBlock) -> Vec<Block> {
    if !incoming.start.is_finite() || !incoming.dur.is_finite() {
        return existing.to_vec();
    }
    let range_start = incoming.start.max(0.0);
    let range_end = incoming.end().min(DAY_MINUTES);

    let mut next = trim_range(existing, range_start, range_end, EPSILON);
    if range_end - range_start > EPSILON {
        next.push(Block {
            id: next_block_id(),
            start: range_start,
            dur: range_end - range_start,
            category_id: incoming.category_id.clone(),
        });
    }
    sort_by_start(&mut next);
    coalesce_adjacent(next)
}

/// Erases `[start, start + dur)`. Trimmed remnants shorter than the erase
/// granularity are dropped; untouched blocks pass through as they are.
pub fn remove_range(existing: &[Block], start: f64, dur: f64) -> Vec<Block> {
    if !start.is_finite() || !dur.is_finite() {
        return existing.to_vec();
    }
    let range_start = start.max(0.0);
    let range_end = (start + dur).min(DAY_MINUTES);
    let mut next = trim_range(existing, range_start, range_end, MIN_ERASE_REMNANT_MINUTES);
    sort_by_start(&mut next);
    next
}

/// Joins consecutive same-category blocks separated by at most `max_gap_minutes`.
pub fn merge_near_same_category(blocks: &[Block], max_gap_minutes: f64) -> Vec<Block> {
    let mut sorted = blocks.to_vec();
    sort_by_start(&mut sorted);

    let mut merged: Vec<Block> = Vec::with_capacity(sorted.len());
    for block in sorted {
        if let Some(last) = merged.last_mut() {
            let gap = block.start - last.end();
            if last.category_id == block.category_id && gap <= max_gap_minutes + EPSILON {
                let end = last.end().max(block.end());
                last.dur = end - last.start;
                continue;
            }
        }
        merged.push(block);
    }
    merged
}

fn trim_range(existing: &[Block], range_start: f64, range_end: f64, min_remnant: f64) -> Vec<Block> {
    if range_end - range_start <= EPSILON {
        return existing.to_vec();
    }

    let mut kept = Vec::with_capacity(existing.len() + 1);
    for block in existing {
        if block.end() <= range_start + EPSILON || block.start >= range_end - EPSILON {
            kept.push(block.clone());
            continue;
        }

        if block.start < range_start - EPSILON {
            push_remnant(&mut kept, block, block.start, range_start, min_remnant);
        }
        if block.end() > range_end + EPSILON {
            push_remnant(&mut kept, block, range_end, block.end(), min_remnant);
        }
    }
    kept
}

fn push_remnant(kept: &mut Vec<Block>, source: &Block, start: f64, end: f64, min_remnant: f64) {
    let dur = end - start;
    if dur > EPSILON && dur >= min_remnant - EPSILON {
        kept.push(Block {
            id: next_block_id(),
            start,
            dur,
            category_id: source.category_id.clone(),
        });
    }
}

fn coalesce_adjacent(sorted: Vec<Block>) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::with_capacity(sorted.len());
    for block in sorted {
        if block.dur <= EPSILON {
            continue;
        }
        if let Some(last) = merged.last_mut() {
            if last.category_id == block.category_id && (last.end() - block.start).abs() <= EPSILON {
                last.dur = block.end() - last.start;
                continue;
            }
        }
        merged.push(block);
    }
    merged
}

fn sort_by_start(blocks: &mut [Block]) {
    blocks.sort_by(|left, right| left.start.total_cmp(&right.start));
}
