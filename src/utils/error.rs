use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    SshError(#[from] ssh2::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),

    #[error("Could not connect to {host}: {message}")]
    ConnectionError { host: String, message: String },

    #[error("{step} failed with exit status {exit_status}: {stderr}")]
    CommandFailed {
        step: String,
        exit_status: i32,
        stderr: String,
    },

    #[error("Upload of {local} to {remote} failed: {message}")]
    UploadFailed {
        local: String,
        remote: String,
        message: String,
    },

    #[error("Local file {path} not found")]
    LocalFileMissing { path: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Remote,
    Local,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl OpsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OpsError::TomlParseError(_)
            | OpsError::MissingConfigError { .. }
            | OpsError::InvalidConfigValueError { .. }
            | OpsError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            OpsError::SshError(_) | OpsError::ConnectionError { .. } => ErrorCategory::Connection,
            OpsError::CommandFailed { .. } | OpsError::UploadFailed { .. } => ErrorCategory::Remote,
            OpsError::IoError(_)
            | OpsError::LocalFileMissing { .. }
            | OpsError::TaskJoinError(_) => ErrorCategory::Local,
            OpsError::SerializationError(_) | OpsError::NotFound { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            OpsError::NotFound { .. } => ErrorSeverity::Medium,
            OpsError::ConnectionError { .. } | OpsError::SshError(_) => ErrorSeverity::Medium,
            OpsError::CommandFailed { .. } | OpsError::UploadFailed { .. } => ErrorSeverity::High,
            OpsError::TomlParseError(_)
            | OpsError::MissingConfigError { .. }
            | OpsError::InvalidConfigValueError { .. }
            | OpsError::ConfigValidationError { .. }
            | OpsError::LocalFileMissing { .. }
            | OpsError::SerializationError(_) => ErrorSeverity::High,
            OpsError::IoError(_) | OpsError::TaskJoinError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the configuration file and that every ${VAR} it references is exported"
                    .to_string()
            }
            ErrorCategory::Connection => {
                "Check the host, port and SSH credentials, and that the host is reachable".to_string()
            }
            ErrorCategory::Remote => {
                "Inspect the printed stderr; an interrupted redeploy may be half-applied"
                    .to_string()
            }
            ErrorCategory::Local => match self {
                OpsError::LocalFileMissing { .. } => {
                    "Build the server file or pass --local-file with the correct path".to_string()
                }
                _ => "Check local file permissions and available disk space".to_string(),
            },
            ErrorCategory::Data => {
                "Run `remote-patch debug-db` to inspect the rows the task depends on".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            OpsError::ConnectionError { host, .. } => format!("Could not reach {}", host),
            OpsError::SshError(e) => format!("SSH session failed: {}", e.message()),
            OpsError::LocalFileMissing { path } => format!("Local file {} not found!", path),
            OpsError::NotFound { what } => format!("{} does not exist on the remote database", what),
            OpsError::MissingConfigError { field } => {
                format!("Configuration is missing '{}'", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpsError>;
