pub mod create_service;
pub mod debug_database;
pub mod redeploy;

pub use create_service::CreateServiceTask;
pub use debug_database::DebugDatabaseTask;
pub use redeploy::RedeployTask;

use crate::domain::model::{CommandOutput, StepOutcome, TaskReport};
use crate::domain::ports::RemoteSession;
use crate::utils::error::Result;

/// Runs `command`, logging and recording it under `label` in its masked form.
pub(crate) async fn exec_step(
    session: &dyn RemoteSession,
    report: &mut TaskReport,
    label: &str,
    command: &str,
    masked: String,
) -> Result<CommandOutput> {
    tracing::info!("{}...", label);
    tracing::debug!("$ {}", masked);

    let output = session.exec(command).await?;
    if !output.success() {
        tracing::warn!("'{}' exited with status {}", label, output.exit_status);
    }

    report.push(StepOutcome::command(label, masked, output.clone()));
    Ok(output)
}
