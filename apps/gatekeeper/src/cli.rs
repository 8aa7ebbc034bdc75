use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use authorizer::{AuthorizerConfig, AuthorizerModule};
use authorizer_sdk::AuthorizerRequest;
use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "gatekeeper")]
#[command(about = "Gatekeeper - API gateway request authorizer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize one gateway event and print the policy document
    Authorize {
        /// YAML configuration file; GATEKEEPER__* variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Event JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: String,
    },

    /// Validate configuration and exit
    CheckConfig {
        /// YAML configuration file; GATEKEEPER__* variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Execute the parsed command.
///
/// A rejected request is reported on stdout as `Unauthorized` with a failing
/// exit code; only operational problems are errors.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::CheckConfig { config } => {
            let cfg = load_config(config.as_deref())?;
            tracing::info!(
                issuer = %cfg.issuer,
                jwks_url = %cfg.jwks_url,
                legacy_roles = cfg.legacy_roles.len(),
                functional_scopes = cfg.functional.scopes.len(),
                "Configuration is valid"
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Authorize { config, event } => {
            let cfg = load_config(config.as_deref())?;
            let request = read_event(&event)?;
            let module = AuthorizerModule::init(&cfg)?;

            if let Ok(result) = module.client().authorize(request).await {
                println!("{}", serde_json::to_string_pretty(&result)?);
                Ok(ExitCode::SUCCESS)
            } else {
                println!("Unauthorized");
                Ok(ExitCode::from(2))
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AuthorizerConfig> {
    if let Some(path) = path
        && !path.is_file()
    {
        bail!("configuration file {} not found", path.display());
    }
    AuthorizerConfig::from_figment(&AuthorizerConfig::figment(path))
}

fn read_event(source: &str) -> anyhow::Result<AuthorizerRequest> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read event {source}"))?
    };
    serde_json::from_str(&raw).context("event is not a valid authorizer request")
}
