pub mod autosave;
pub mod bootstrap;
pub mod commands;
pub mod day_board;
pub mod day_sync;
