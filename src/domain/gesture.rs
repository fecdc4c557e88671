use crate::domain::interval::{GRID_MINUTES, snap_selection};
use crate::domain::models::DayKey;

pub const CELL_COUNT: usize = 288;

/// Presentation-owned mapping from client coordinates to timeline cells.
pub trait CellGeometry {
    fn cell_at(&self, client_x: f64, client_y: f64) -> Option<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Pending {
        day_key: DayKey,
        start_cell: usize,
    },
    Dragging {
        day_key: DayKey,
        start_cell: usize,
        current_cell: usize,
    },
}

/// A finished gesture, bound to the day it was started on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub day_key: DayKey,
    pub first_cell: usize,
    pub last_cell: usize,
    pub dragged: bool,
}

impl Selection {
    /// Snapped `(start, dur)` in minutes covering both end cells.
    pub fn minutes(&self) -> (f64, f64) {
        let low = self.first_cell.min(self.last_cell) as f64 * GRID_MINUTES;
        let high = (self.first_cell.max(self.last_cell) + 1) as f64 * GRID_MINUTES;
        snap_selection(low, high)
    }
}

#[derive(Debug, Clone)]
pub struct GestureTracker {
    state: GestureState,
}

impl Default for GestureTracker {
    fn default() -> Self {
        Self {
            state: GestureState::Idle,
        }
    }
}

impl GestureTracker {
    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn pointer_down(&mut self, day_key: DayKey, cell: usize) {
        if cell >= CELL_COUNT {
            self.state = GestureState::Idle;
            return;
        }
        self.state = GestureState::Pending {
            day_key,
            start_cell: cell,
        };
    }

    pub fn pointer_move(&mut self, cell: usize) {
        if cell >= CELL_COUNT {
            return;
        }
        self.state = match self.state {
            GestureState::Pending {
                day_key,
                start_cell,
            } if cell != start_cell => GestureState::Dragging {
                day_key,
                start_cell,
                current_cell: cell,
            },
            GestureState::Dragging {
                day_key,
                start_cell,
                ..
            } => GestureState::Dragging {
                day_key,
                start_cell,
                current_cell: cell,
            },
            other => other,
        };
    }

    /// Ends the gesture. A press without movement is a single-cell click.
    pub fn pointer_up(&mut self, cell: Option<usize>) -> Option<Selection> {
        match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle => None,
            GestureState::Pending {
                day_key,
                start_cell,
            } => Some(Selection {
                day_key,
                first_cell: start_cell,
                last_cell: start_cell,
                dragged: false,
            }),
            GestureState::Dragging {
                day_key,
                start_cell,
                current_cell,
            } => Some(Selection {
                day_key,
                first_cell: start_cell,
                last_cell: cell.filter(|cell| *cell < CELL_COUNT).unwrap_or(current_cell),
                dragged: true,
            }),
        }
    }

    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }

    pub fn pointer_down_at(&mut self, geometry: &impl CellGeometry, day_key: DayKey, x: f64, y: f64) {
        match geometry.cell_at(x, y) {
            Some(cell) => self.pointer_down(day_key, cell),
            None => self.cancel(),
        }
    }

    pub fn pointer_move_at(&mut self, geometry: &impl CellGeometry, x: f64, y: f64) {
        if let Some(cell) = geometry.cell_at(x, y) {
            self.pointer_move(cell);
        }
    }

    pub fn pointer_up_at(&mut self, geometry: &impl CellGeometry, x: f64, y: f64) -> Option<Selection> {
        self.pointer_up(geometry.cell_at(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 24 rows of 12 five-minute cells, 10px square.
    struct HourRows;

    impl CellGeometry for HourRows {
        fn cell_at(&self, client_x: f64, client_y: f64) -> Option<usize> {
            if client_x < 0.0 || client_y < 0.0 {
                return None;
            }
            let column = (client_x / 10.0) as usize;
            let row = (client_y / 10.0) as usize;
            (column < 12 && row < 24).then_some(row * 12 + column)
        }
    }

    fn day(value: &str) -> DayKey {
        DayKey::parse(value).expect("valid day key")
    }

    #[test]
    fn click_without_movement_selects_one_cell() {
        let mut gesture = GestureTracker::default();
        gesture.pointer_down(day("2026-03-09"), 20);
        let selection = gesture.pointer_up(Some(20)).expect("selection");
        assert!(!selection.dragged);
        assert_eq!(selection.minutes(), (100.0, 5.0));
        assert_eq!(gesture.state(), GestureState::Idle);
    }

    #[test]
    fn drag_selects_range_in_either_direction() {
        let mut gesture = GestureTracker::default();
        gesture.pointer_down(day("2026-03-09"), 30);
        gesture.pointer_move(25);
        gesture.pointer_move(24);
        let selection = gesture.pointer_up(Some(24)).expect("selection");
        assert!(selection.dragged);
        assert_eq!(selection.minutes(), (120.0, 35.0));
    }

    #[test]
    fn moving_within_the_start_cell_stays_pending() {
        let mut gesture = GestureTracker::default();
        gesture.pointer_down(day("2026-03-09"), 3);
        gesture.pointer_move(3);
        assert!(matches!(gesture.state(), GestureState::Pending { .. }));
    }

    #[test]
    fn cancel_discards_in_flight_drag() {
        let mut gesture = GestureTracker::default();
        gesture.pointer_down(day("2026-03-09"), 3);
        gesture.pointer_move(9);
        gesture.cancel();
        assert_eq!(gesture.pointer_up(Some(9)), None);
    }

    #[test]
    fn geometry_maps_client_coordinates_to_cells() {
        let mut gesture = GestureTracker::default();
        gesture.pointer_down_at(&HourRows, day("2026-03-09"), 5.0, 15.0);
        gesture.pointer_move_at(&HourRows, 35.0, 15.0);
        let selection = gesture.pointer_up_at(&HourRows, 500.0, 15.0).expect("selection");
        assert_eq!(selection.first_cell, 12);
        assert_eq!(selection.last_cell, 15);
        assert_eq!(selection.minutes(), (60.0, 20.0));

        gesture.pointer_down_at(&HourRows, day("2026-03-09"), -1.0, 0.0);
        assert_eq!(gesture.state(), GestureState::Idle);
    }
}
