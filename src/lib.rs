pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{AppState, flush_pending_impl};
use infrastructure::error::InfraError;
use infrastructure::logging::enable_logging;

/// Opens the workspace in the current directory and delivers every queued
/// day for the configured user once.
pub fn run() -> Result<(), InfraError> {
    let workspace_root = std::env::current_dir()?;
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async move {
        let app_state = AppState::new(workspace_root)?;
        enable_logging(app_state.logs_dir(), None, true)?;
        tracing::info!(
            user_id = app_state.user_id(),
            database = %app_state.database_path().display(),
            "workspace ready"
        );

        let report = flush_pending_impl(&app_state)
            .await
            .inspect_err(|error| {
                app_state.command_error("flush_pending", error);
            })?;
        app_state.shutdown()?;

        match report.failure {
            Some(failure) => tracing::warn!(
                delivered = report.delivered.len(),
                remaining = report.remaining,
                %failure,
                "pending writes left queued"
            ),
            None => tracing::info!(delivered = report.delivered.len(), "pending writes delivered"),
        }
        Ok(())
    })
}
