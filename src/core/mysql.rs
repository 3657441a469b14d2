//! Builds `mysql` client invocations for execution on the remote host.

use crate::config::DatabaseConfig;
use crate::utils::shell;

#[derive(Debug, Clone)]
pub struct MysqlCli {
    config: DatabaseConfig,
}

impl MysqlCli {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// Tabular output, as printed by the interactive client.
    pub fn query(&self, sql: &str) -> String {
        self.build(sql, false)
    }

    /// Tab-separated output without column headers.
    pub fn batch_query(&self, sql: &str) -> String {
        self.build(sql, true)
    }

    fn build(&self, sql: &str, batch: bool) -> String {
        let mut parts = vec![
            "mysql".to_string(),
            format!("--user={}", shell::quote(&self.config.user)),
            format!("--password={}", shell::quote(&self.config.password)),
            format!("--host={}", shell::quote(&self.config.host)),
        ];
        if let Some(port) = self.config.port {
            parts.push(format!("--port={}", port));
        }
        if batch {
            parts.push("-N".to_string());
            parts.push("-B".to_string());
        }
        parts.push(shell::quote(&self.config.name));
        parts.push("-e".to_string());
        parts.push(shell::quote(sql));
        parts.join(" ")
    }

    pub fn redacted(&self, command: &str) -> String {
        shell::redact(command, &[&self.config.password])
    }
}

/// MySQL single-quoted string literal.
pub fn sql_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str(r"\\"),
            '\'' => escaped.push_str("''"),
            '\0' => escaped.push_str(r"\0"),
            '\n' => escaped.push_str(r"\n"),
            '\r' => escaped.push_str(r"\r"),
            other => escaped.push(other),
        }
    }
    escaped.push('\'');
    escaped
}

/// Escapes `%` and `_` so a value matches literally inside a LIKE pattern.
pub fn like_escape(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('%', r"\%")
        .replace('_', r"\_")
}

/// First non-empty line of batch output, parsed as an id.
pub fn parse_single_id(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split('\t').next())
        .and_then(|field| field.trim().parse().ok())
}
