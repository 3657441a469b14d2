use crate::domain::model::ServiceDefinition;
use crate::utils::error::{OpsError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub ssh: SshConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub service: ServiceDefinition,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    pub deploy: Option<DeployConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    pub passphrase: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub service_slug: String,
    pub category_slug: String,
    pub keyword: String,
    pub feature_service_id: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            service_slug: "search-engine-optimization".to_string(),
            category_slug: "digital-marketing-seo".to_string(),
            keyword: "seo".to_string(),
            feature_service_id: 133,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub remote_dir: String,
    pub local_file: PathBuf,
    pub remote_file: String,
    #[serde(default = "default_process_pattern")]
    pub process_pattern: String,
    #[serde(default = "default_launcher")]
    pub launcher: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_log_lines")]
    pub log_lines: u32,
    #[serde(default = "default_stop_wait")]
    pub stop_wait_seconds: u64,
    #[serde(default = "default_start_wait")]
    pub start_wait_seconds: u64,
    pub health_url: Option<String>,
    #[serde(default = "default_true")]
    pub backup: bool,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_process_pattern() -> String {
    "node".to_string()
}

fn default_launcher() -> String {
    "node".to_string()
}

fn default_log_file() -> String {
    "server.log".to_string()
}

fn default_log_lines() -> u32 {
    10
}

fn default_stop_wait() -> u64 {
    2
}

fn default_start_wait() -> u64 {
    3
}

fn default_true() -> bool {
    true
}

impl SshConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("ssh.host", &self.host)?;
        validation::validate_resolved("ssh.host", &self.host)?;
        validation::validate_non_empty_string("ssh.user", &self.user)?;
        validation::validate_positive_number("ssh.port", u64::from(self.port), 1)?;
        validation::validate_positive_number(
            "ssh.connect_timeout_seconds",
            self.connect_timeout_seconds,
            1,
        )?;

        match (&self.password, &self.private_key) {
            (Some(password), None) => validation::validate_resolved("ssh.password", password),
            (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(OpsError::ConfigValidationError {
                field: "ssh".to_string(),
                message: "set either password or private_key, not both".to_string(),
            }),
            (None, None) => Err(OpsError::MissingConfigError {
                field: "ssh.password or ssh.private_key".to_string(),
            }),
        }
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("database.user", &self.user)?;
        validation::validate_non_empty_string("database.host", &self.host)?;
        validation::validate_non_empty_string("database.name", &self.name)?;
        validation::validate_resolved("database.password", &self.password)?;
        Ok(())
    }
}

impl DeployConfig {
    pub fn stop_wait(&self) -> Duration {
        Duration::from_secs(self.stop_wait_seconds)
    }

    pub fn start_wait(&self) -> Duration {
        Duration::from_secs(self.start_wait_seconds)
    }

    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), self.remote_file)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_absolute_remote_path("deploy.remote_dir", &self.remote_dir)?;
        validation::validate_file_name("deploy.remote_file", &self.remote_file)?;
        validation::validate_file_name("deploy.log_file", &self.log_file)?;
        validation::validate_non_empty_string("deploy.process_pattern", &self.process_pattern)?;
        validation::validate_non_empty_string("deploy.launcher", &self.launcher)?;
        validation::validate_range("deploy.log_lines", self.log_lines, 1, 1000)?;
        if let Some(url) = &self.health_url {
            validation::validate_url("deploy.health_url", url)?;
        }
        Ok(())
    }
}

fn env_reference() -> Result<Regex> {
    Regex::new(r"\$\{([^}]+)\}").map_err(|e| OpsError::ConfigValidationError {
        field: "environment".to_string(),
        message: e.to_string(),
    })
}

impl OpsConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(OpsError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses first, then substitutes `${VAR}` inside string values, so
    /// secrets containing quotes or backslashes never reach the TOML parser.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut document = toml::Value::Table(toml::from_str::<toml::Table>(content)?);
        let re = env_reference()?;
        Self::substitute_env_vars(&re, &mut document);
        Ok(document.try_into()?)
    }

    /// 替換環境變數 (例如 ${SSH_PASSWORD})
    fn substitute_env_vars(re: &Regex, value: &mut toml::Value) {
        match value {
            toml::Value::String(text) => {
                let replaced = re.replace_all(text, |caps: &regex::Captures| {
                    let var_name = &caps[1];
                    std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
                });
                *text = replaced.into_owned();
            }
            toml::Value::Array(items) => {
                for item in items {
                    Self::substitute_env_vars(re, item);
                }
            }
            toml::Value::Table(table) => {
                for (_, item) in table.iter_mut() {
                    Self::substitute_env_vars(re, item);
                }
            }
            _ => {}
        }
    }

    pub fn database(&self) -> Result<&DatabaseConfig> {
        validation::validate_required_field("database", &self.database)
    }

    pub fn deploy(&self) -> Result<&DeployConfig> {
        validation::validate_required_field("deploy", &self.deploy)
    }

    /// Every credential value, for masking in printed commands.
    pub fn secrets(&self) -> Vec<&str> {
        let mut secrets = Vec::new();
        if let Some(password) = &self.ssh.password {
            secrets.push(password.as_str());
        }
        if let Some(passphrase) = &self.ssh.passphrase {
            secrets.push(passphrase.as_str());
        }
        if let Some(db) = &self.database {
            secrets.push(db.password.as_str());
        }
        secrets
    }
}

impl Validate for OpsConfig {
    fn validate(&self) -> Result<()> {
        self.ssh.validate()?;
        if let Some(db) = &self.database {
            db.validate()?;
        }
        validation::validate_non_empty_string("service.slug", &self.service.slug)?;
        validation::validate_non_empty_string(
            "service.category_slug",
            &self.service.category_slug,
        )?;
        if let Some(deploy) = &self.deploy {
            deploy.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[ssh]
host = "203.0.113.10"
user = "root"
password = "secret"
"#;

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        let config = OpsConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.connect_timeout_seconds, 30);
        assert_eq!(config.service.slug, "search-engine-optimization");
        assert_eq!(config.diagnostics.feature_service_id, 133);
        assert!(config.database.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("REMOTE_PATCH_TEST_DB_PASSWORD", "from-env");

        let toml_content = format!(
            "{}\n[database]\nuser = \"app\"\npassword = \"${{REMOTE_PATCH_TEST_DB_PASSWORD}}\"\nhost = \"127.0.0.1\"\nname = \"appdb\"\n",
            MINIMAL
        );

        let config = OpsConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.database().unwrap().password, "from-env");

        std::env::remove_var("REMOTE_PATCH_TEST_DB_PASSWORD");
    }

    #[test]
    fn test_env_secret_with_quote_and_backslash() {
        std::env::set_var("REMOTE_PATCH_TEST_SSH_PASSWORD", r#"pa\ss"word"#);

        let toml_content = r#"
[ssh]
host = "203.0.113.10"
user = "root"
password = "${REMOTE_PATCH_TEST_SSH_PASSWORD}"
"#;

        let config = OpsConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.ssh.password.as_deref(), Some(r#"pa\ss"word"#));
        assert_eq!(config.ssh.port, 22);
        assert!(config.validate().is_ok());

        std::env::remove_var("REMOTE_PATCH_TEST_SSH_PASSWORD");
    }

    #[test]
    fn test_env_value_cannot_inject_keys() {
        std::env::set_var(
            "REMOTE_PATCH_TEST_INJECTED_HOST",
            "h\"\nport = 2222\nx = \"",
        );

        let toml_content = r#"
[ssh]
host = "${REMOTE_PATCH_TEST_INJECTED_HOST}"
user = "root"
password = "p"
"#;

        let config = OpsConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.ssh.port, 22);
        assert!(config.ssh.host.starts_with("h\""));

        std::env::remove_var("REMOTE_PATCH_TEST_INJECTED_HOST");
    }

    #[test]
    fn test_unresolved_password_is_rejected() {
        let toml_content = r#"
[ssh]
host = "203.0.113.10"
user = "root"
password = "${REMOTE_PATCH_TEST_NEVER_SET}"
"#;
        let config = OpsConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(OpsError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_ssh_requires_exactly_one_credential() {
        let none = r#"
[ssh]
host = "h"
user = "root"
"#;
        let config = OpsConfig::from_toml_str(none).unwrap();
        assert!(matches!(
            config.validate(),
            Err(OpsError::MissingConfigError { .. })
        ));

        let both = r#"
[ssh]
host = "h"
user = "root"
password = "p"
private_key = "/root/.ssh/id_ed25519"
"#;
        let config = OpsConfig::from_toml_str(both).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deploy_section_validation() {
        let toml_content = format!(
            "{}\n[deploy]\nremote_dir = \"relative/dir\"\nlocal_file = \"server.cjs\"\nremote_file = \"server.cjs\"\n",
            MINIMAL
        );
        let config = OpsConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deploy_defaults_and_remote_path() {
        let toml_content = format!(
            "{}\n[deploy]\nremote_dir = \"/var/www/app/\"\nlocal_file = \"server.cjs\"\nremote_file = \"production-server.cjs\"\nhealth_url = \"https://example.com/api/health\"\n",
            MINIMAL
        );
        let config = OpsConfig::from_toml_str(&toml_content).unwrap();
        let deploy = config.deploy().unwrap();

        assert_eq!(deploy.remote_path(), "/var/www/app/production-server.cjs");
        assert_eq!(deploy.process_pattern, "node");
        assert_eq!(deploy.log_lines, 10);
        assert_eq!(deploy.stop_wait(), Duration::from_secs(2));
        assert_eq!(deploy.start_wait(), Duration::from_secs(3));
        assert!(deploy.backup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_are_reported() {
        let config = OpsConfig::from_toml_str(MINIMAL).unwrap();
        assert!(matches!(
            config.database(),
            Err(OpsError::MissingConfigError { .. })
        ));
        assert!(config.deploy().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = OpsConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.ssh.host, "203.0.113.10");
        assert_eq!(config.secrets(), vec!["secret"]);
    }
}
