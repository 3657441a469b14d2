use super::exec_step;
use crate::config::DeployConfig;
use crate::domain::model::{CommandOutput, StepOutcome, TaskReport};
use crate::domain::ports::{RemoteSession, Task};
use crate::utils::error::{OpsError, Result};
use crate::utils::shell::quote;
use async_trait::async_trait;
use std::time::Duration;

/// Backup, upload, stop, start, then inspect the restarted server.
pub struct RedeployTask {
    deploy: DeployConfig,
}

impl RedeployTask {
    pub fn new(deploy: DeployConfig) -> Self {
        Self { deploy }
    }

    fn in_dir(&self, command: &str) -> String {
        format!("cd {} && {}", quote(&self.deploy.remote_dir), command)
    }

    pub fn backup_command(&self) -> String {
        let file = &self.deploy.remote_file;
        self.in_dir(&format!("cp {} {}", quote(file), quote(&format!("{}.backup", file))))
    }

    pub fn stop_command(&self) -> String {
        format!("pkill -f {}", quote(&self.deploy.process_pattern))
    }

    pub fn start_command(&self) -> String {
        // Only the server goes to the background; backgrounding the whole
        // `cd && ...` list keeps a subshell holding the channel's stdout.
        self.in_dir(&format!(
            "{{ nohup {} {} > {} 2>&1 < /dev/null & }}",
            quote(&self.deploy.launcher),
            quote(&self.deploy.remote_file),
            quote(&self.deploy.log_file)
        ))
    }

    pub fn status_command(&self) -> String {
        format!("ps aux | grep {}", quote(&self.deploy.process_pattern))
    }

    pub fn log_command(&self) -> String {
        self.in_dir(&format!(
            "tail -{} {}",
            self.deploy.log_lines,
            quote(&self.deploy.log_file)
        ))
    }

    pub fn health_command(&self) -> Option<String> {
        self.deploy
            .health_url
            .as_ref()
            .map(|url| format!("curl -s {}", quote(url)))
    }

    async fn step(
        &self,
        session: &dyn RemoteSession,
        report: &mut TaskReport,
        label: &str,
        command: String,
    ) -> Result<CommandOutput> {
        exec_step(session, report, label, &command, command.clone()).await
    }

    async fn pause(&self, session: &dyn RemoteSession, wait: Duration) {
        if session.is_dry_run() || wait.is_zero() {
            return;
        }
        tracing::debug!("waiting {:?}", wait);
        tokio::time::sleep(wait).await;
    }

    async fn backup(&self, session: &dyn RemoteSession, report: &mut TaskReport) {
        let label = "Backing up current server file";
        match self.step(session, report, label, self.backup_command()).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                tracing::warn!("Backup skipped: {}", output.stderr.trim());
            }
            Err(e) => {
                tracing::warn!("Backup skipped: {}", e);
                report.push(StepOutcome::note(label, format!("skipped: {}", e)));
            }
        }
    }
}

#[async_trait]
impl Task for RedeployTask {
    fn name(&self) -> &'static str {
        "redeploy"
    }

    fn preflight(&self) -> Result<()> {
        if !self.deploy.local_file.is_file() {
            return Err(OpsError::LocalFileMissing {
                path: self.deploy.local_file.display().to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, session: &dyn RemoteSession, report: &mut TaskReport) -> Result<()> {
        if self.deploy.backup {
            self.backup(session, report).await;
        }

        let remote_path = self.deploy.remote_path();
        tracing::info!("Uploading new server file...");
        let bytes = session.upload(&self.deploy.local_file, &remote_path).await?;
        report.push(StepOutcome::note(
            "Uploading new server file",
            format!(
                "{} -> {} ({} bytes)",
                self.deploy.local_file.display(),
                remote_path,
                bytes
            ),
        ));

        // pkill exits 1 when nothing matched, which is fine here.
        self.step(session, report, "Stopping old server", self.stop_command())
            .await?;
        self.pause(session, self.deploy.stop_wait()).await;

        let started = self
            .step(session, report, "Starting new server", self.start_command())
            .await?;
        if !started.success() {
            report.fail();
        }
        self.pause(session, self.deploy.start_wait()).await;

        self.step(session, report, "Checking server status", self.status_command())
            .await?;
        self.step(session, report, "Checking server log", self.log_command())
            .await?;

        match self.health_command() {
            Some(command) => {
                let health = self
                    .step(session, report, "Testing API endpoint", command)
                    .await?;
                if !health.success() || health.stdout.trim().is_empty() {
                    tracing::warn!("Health endpoint gave no response");
                }
            }
            None => report.push(StepOutcome::note("Testing API endpoint", "skipped")),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn deploy() -> DeployConfig {
        DeployConfig {
            remote_dir: "/var/www/vhosts/example.com/app".to_string(),
            local_file: PathBuf::from("does-not-exist.cjs"),
            remote_file: "production-server.cjs".to_string(),
            process_pattern: "node".to_string(),
            launcher: "node".to_string(),
            log_file: "server.log".to_string(),
            log_lines: 10,
            stop_wait_seconds: 2,
            start_wait_seconds: 3,
            health_url: Some("https://www.example.com/api/health".to_string()),
            backup: true,
        }
    }

    #[test]
    fn test_commands() {
        let task = RedeployTask::new(deploy());
        assert_eq!(
            task.backup_command(),
            "cd /var/www/vhosts/example.com/app && cp production-server.cjs production-server.cjs.backup"
        );
        assert_eq!(task.stop_command(), "pkill -f node");
        assert_eq!(
            task.start_command(),
            "cd /var/www/vhosts/example.com/app && { nohup node production-server.cjs > server.log 2>&1 < /dev/null & }"
        );
        assert_eq!(task.status_command(), "ps aux | grep node");
        assert_eq!(
            task.log_command(),
            "cd /var/www/vhosts/example.com/app && tail -10 server.log"
        );
        assert_eq!(
            task.health_command().as_deref(),
            Some("curl -s https://www.example.com/api/health")
        );
    }

    #[test]
    fn test_start_command_releases_stdout_under_bash() {
        use std::io::Read;
        use std::process::{Command, Stdio};
        use std::time::Instant;

        let dir = tempfile::tempdir().unwrap();
        let mut config = deploy();
        config.remote_dir = dir.path().display().to_string();
        config.launcher = "sleep".to_string();
        config.remote_file = "3".to_string();
        let command = RedeployTask::new(config).start_command();

        let start = Instant::now();
        let mut child = Command::new("bash")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let mut stdout = String::new();
        child
            .stdout
            .take()
            .unwrap()
            .read_to_string(&mut stdout)
            .unwrap();
        let status = child.wait().unwrap();

        assert!(status.success());
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "stdout held open for {:?} by: {}",
            start.elapsed(),
            command
        );
    }

    #[test]
    fn test_directory_with_spaces_is_quoted() {
        let mut config = deploy();
        config.remote_dir = "/srv/my app".to_string();
        let task = RedeployTask::new(config);
        assert!(task.log_command().starts_with("cd '/srv/my app' && "));
    }

    #[test]
    fn test_preflight_requires_local_file() {
        let task = RedeployTask::new(deploy());
        assert!(matches!(
            task.preflight(),
            Err(OpsError::LocalFileMissing { .. })
        ));
    }
}
