use crate::adapters::ssh::SshSession;
use crate::config::OpsConfig;
use crate::domain::model::{CommandOutput, TaskReport};
use crate::domain::ports::{RemoteSession, Task};
use crate::utils::error::Result;
use crate::utils::shell;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub struct TaskRunner {
    config: OpsConfig,
    dry_run: bool,
    format: OutputFormat,
}

impl TaskRunner {
    pub fn new(config: OpsConfig) -> Self {
        Self {
            config,
            dry_run: false,
            format: OutputFormat::Text,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Opens one session, runs the task over it, closes it and prints the report.
    pub async fn run(&self, task: &dyn Task) -> Result<TaskReport> {
        task.preflight()?;

        if self.dry_run {
            tracing::info!("🔍 DRY RUN MODE - commands are printed, not executed");
            let session = DryRunSession::default();
            return self.run_with_session(task, &session).await;
        }

        let session = SshSession::connect(&self.config.ssh).await?;
        self.run_with_session(task, &session).await
    }

    pub async fn run_with_session(
        &self,
        task: &dyn Task,
        session: &dyn RemoteSession,
    ) -> Result<TaskReport> {
        let start = Instant::now();
        let mut report = TaskReport::new(task.name(), &self.config.ssh.host);

        tracing::info!("Running {} against {}", task.name(), self.config.ssh.host);
        let outcome = task.run(session, &mut report).await;

        if let Err(e) = session.close().await {
            tracing::warn!("Closing the session failed: {}", e);
        }

        if outcome.is_err() {
            report.fail();
        }
        report.finish();
        self.mask(&mut report);
        self.print(&report)?;

        tracing::info!(
            "{} finished in {:?} ({})",
            task.name(),
            start.elapsed(),
            if report.success { "ok" } else { "failed" }
        );

        outcome.map(|_| report)
    }

    /// Masks every configured credential in commands, output and notes.
    fn mask(&self, report: &mut TaskReport) {
        let secrets = self.config.secrets();
        for step in &mut report.steps {
            if let Some(command) = step.command.as_mut() {
                *command = shell::redact(command, &secrets);
            }
            if let Some(output) = step.output.as_mut() {
                output.stdout = shell::redact(&output.stdout, &secrets);
                output.stderr = shell::redact(&output.stderr, &secrets);
            }
            if let Some(note) = step.note.as_mut() {
                *note = shell::redact(note, &secrets);
            }
        }
    }

    fn print(&self, report: &TaskReport) -> Result<()> {
        match self.format {
            OutputFormat::Text => print!("{}", render_text(report)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        }
        Ok(())
    }
}

pub fn render_text(report: &TaskReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} @ {}", report.task, report.host);

    for (index, step) in report.steps.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}. {}", index + 1, step.label);
        if let Some(command) = &step.command {
            let _ = writeln!(out, "$ {}", command);
        }
        if let Some(output) = &step.output {
            if !output.stdout.trim().is_empty() {
                let _ = writeln!(out, "{}", output.stdout.trim_end());
            }
            if !output.stderr.trim().is_empty() {
                let _ = writeln!(out, "[stderr] {}", output.stderr.trim_end());
            }
            if !output.success() {
                let _ = writeln!(out, "[exit status {}]", output.exit_status);
            }
        }
        if let Some(note) = &step.note {
            let _ = writeln!(out, "-- {}", note);
        }
    }

    let _ = writeln!(out);
    if report.success {
        let _ = writeln!(out, "✅ {} complete!", report.task);
    } else {
        let _ = writeln!(out, "❌ {} failed", report.task);
    }
    out
}

/// Records what would run; every command "succeeds" with empty output.
#[derive(Debug, Default)]
pub struct DryRunSession {
    recorded: Mutex<Vec<String>>,
}

impl DryRunSession {
    pub fn recorded(&self) -> Vec<String> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn record(&self, entry: String) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(entry);
        }
    }
}

#[async_trait]
impl RemoteSession for DryRunSession {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.record(command.to_string());
        Ok(CommandOutput::default())
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64> {
        self.record(format!("sftp put {} {}", local_path.display(), remote_path));
        Ok(std::fs::metadata(local_path).map(|m| m.len()).unwrap_or(0))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::StepOutcome;

    #[test]
    fn test_render_text_shows_output_and_status() {
        let mut report = TaskReport::new("redeploy", "203.0.113.10");
        report.push(StepOutcome::command(
            "Checking server status",
            "ps aux | grep node".to_string(),
            CommandOutput {
                stdout: "root 1 node server.cjs\n".to_string(),
                stderr: String::new(),
                exit_status: 0,
            },
        ));
        report.push(StepOutcome::command(
            "Testing API endpoint",
            "curl -s https://example.com/api/health".to_string(),
            CommandOutput {
                stdout: String::new(),
                stderr: "connection refused".to_string(),
                exit_status: 7,
            },
        ));
        report.fail();

        let text = render_text(&report);
        assert!(text.contains("1. Checking server status\n$ ps aux | grep node\nroot 1 node server.cjs"));
        assert!(text.contains("[stderr] connection refused"));
        assert!(text.contains("[exit status 7]"));
        assert!(text.ends_with("❌ redeploy failed\n"));
    }

    #[tokio::test]
    async fn test_dry_run_session_records_commands() {
        let session = DryRunSession::default();
        let output = session.exec("pkill -f node").await.unwrap();

        assert!(output.success());
        assert!(session.is_dry_run());
        assert_eq!(session.recorded(), vec!["pkill -f node".to_string()]);
    }
}
