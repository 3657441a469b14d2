pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliArgs;

pub use crate::app::tasks::{CreateServiceTask, DebugDatabaseTask, RedeployTask};
pub use crate::config::OpsConfig;
pub use crate::core::runner::{OutputFormat, TaskRunner};
pub use crate::utils::error::{OpsError, Result};
