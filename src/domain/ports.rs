use crate::domain::model::{CommandOutput, TaskReport};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// An authenticated channel to the remote host.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Runs one shell command and waits for it to finish. A non-zero exit
    /// status is reported in the output, not as an error.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Copies a local file to `remote_path`, returning the bytes written.
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64>;

    async fn close(&self) -> Result<()>;

    /// True when commands are only recorded, never executed.
    fn is_dry_run(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    /// Local checks that must pass before a session is opened.
    fn preflight(&self) -> Result<()> {
        Ok(())
    }

    async fn run(&self, session: &dyn RemoteSession, report: &mut TaskReport) -> Result<()>;
}
