pub mod day_clock;
pub mod gesture;
pub mod history;
pub mod interval;
pub mod models;
pub mod timer;
