pub mod toml_config;

pub use toml_config::{DatabaseConfig, DeployConfig, DiagnosticsConfig, OpsConfig, SshConfig};

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "remote-patch")]
#[command(about = "Patch a remote deployment over SSH: database fixes, diagnostics, server redeploys")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "REMOTE_PATCH_CONFIG",
        default_value = "remote-patch.toml"
    )]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the command sequence without connecting
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Upsert a service row under an existing category
    CreateService {
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category_slug: Option<String>,
    },
    /// Run the diagnostic queries
    DebugDb {
        #[arg(long)]
        service_slug: Option<String>,
        #[arg(long)]
        category_slug: Option<String>,
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        feature_service_id: Option<u64>,
    },
    /// Upload the server file, restart it and check its health
    Redeploy {
        #[arg(long)]
        local_file: Option<PathBuf>,
        #[arg(long)]
        skip_health_check: bool,
    },
}

#[cfg(feature = "cli")]
impl CliArgs {
    /// Command-line values take precedence over the file.
    pub fn apply_overrides(&self, config: &mut OpsConfig) {
        match &self.command {
            Command::CreateService {
                slug,
                name,
                category_slug,
            } => {
                if let Some(slug) = slug {
                    config.service.slug = slug.clone();
                }
                if let Some(name) = name {
                    config.service.name = name.clone();
                }
                if let Some(category_slug) = category_slug {
                    config.service.category_slug = category_slug.clone();
                }
            }
            Command::DebugDb {
                service_slug,
                category_slug,
                keyword,
                feature_service_id,
            } => {
                let diagnostics = &mut config.diagnostics;
                if let Some(service_slug) = service_slug {
                    diagnostics.service_slug = service_slug.clone();
                }
                if let Some(category_slug) = category_slug {
                    diagnostics.category_slug = category_slug.clone();
                }
                if let Some(keyword) = keyword {
                    diagnostics.keyword = keyword.clone();
                }
                if let Some(id) = feature_service_id {
                    diagnostics.feature_service_id = *id;
                }
            }
            Command::Redeploy {
                local_file,
                skip_health_check,
            } => {
                if let Some(deploy) = config.deploy.as_mut() {
                    if let Some(local_file) = local_file {
                        deploy.local_file = local_file.clone();
                    }
                    if *skip_health_check {
                        deploy.health_url = None;
                    }
                }
            }
        }
    }
}
