use clap::Parser;
use remote_patch::config::Command;
use remote_patch::core::mysql::MysqlCli;
use remote_patch::core::Task;
use remote_patch::utils::error::{ErrorSeverity, OpsError};
use remote_patch::utils::{logger, validation::Validate};
use remote_patch::{
    CliArgs, CreateServiceTask, DebugDatabaseTask, OpsConfig, OutputFormat, RedeployTask,
    TaskRunner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("📁 Loading configuration from: {}", args.config.display());

    let mut config = match OpsConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "❌ Failed to load config file '{}': {}",
                args.config.display(),
                e
            );
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    args.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if args.verbose {
        tracing::debug!("Target host: {}", config.ssh.address());
    }

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let runner = TaskRunner::new(config.clone())
        .with_dry_run(args.dry_run)
        .with_format(format);

    let outcome = match build_task(&args.command, &config) {
        Ok(task) => runner.run(task.as_ref()).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(report) if report.success => {
            tracing::info!("✅ {} completed successfully", report.task);
        }
        Ok(report) => {
            tracing::warn!("⚠️ {} finished with failed steps", report.task);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(
                "❌ Task failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn build_task(command: &Command, config: &OpsConfig) -> Result<Box<dyn Task>, OpsError> {
    let task: Box<dyn Task> = match command {
        Command::CreateService { .. } => Box::new(CreateServiceTask::new(
            MysqlCli::new(config.database()?.clone()),
            config.service.clone(),
        )),
        Command::DebugDb { .. } => Box::new(DebugDatabaseTask::new(
            MysqlCli::new(config.database()?.clone()),
            config.diagnostics.clone(),
        )),
        Command::Redeploy { .. } => Box::new(RedeployTask::new(config.deploy()?.clone())),
    };
    Ok(task)
}
