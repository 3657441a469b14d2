use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Captured result of one remote shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub label: String,
    /// Always stored with credentials masked.
    pub command: Option<String>,
    pub output: Option<CommandOutput>,
    pub note: Option<String>,
}

impl StepOutcome {
    pub fn command(label: impl Into<String>, command: String, output: CommandOutput) -> Self {
        Self {
            label: label.into(),
            command: Some(command),
            output: Some(output),
            note: None,
        }
    }

    pub fn note(label: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: None,
            output: None,
            note: Some(note.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepOutcome>,
    pub success: bool,
}

impl TaskReport {
    pub fn new(task: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            host: host.into(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            success: true,
        }
    }

    pub fn push(&mut self, step: StepOutcome) {
        tracing::debug!("step '{}' recorded", step.label);
        self.steps.push(step);
    }

    pub fn fail(&mut self) {
        self.success = false;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn step(&self, label: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.label == label)
    }
}

/// A row of the remote `services` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDefinition {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category_slug: String,
    pub is_active: bool,
    pub sort_order: i64,
}

impl Default for ServiceDefinition {
    fn default() -> Self {
        Self {
            name: "Search Engine Optimization".to_string(),
            slug: "search-engine-optimization".to_string(),
            description: "Professional search engine optimization services with industry-leading expertise and proven results.".to_string(),
            category_slug: "digital-marketing-seo".to_string(),
            is_active: true,
            sort_order: 1,
        }
    }
}
