pub mod config;
pub mod error;
pub mod kv_store;
pub mod logging;
pub mod payload;
pub mod pending_queue;
pub mod remote_store;
pub mod storage;
pub mod sync_state_repository;
