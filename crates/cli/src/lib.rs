pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tierwise_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing::Level;

use crate::commands::evaluate::EvaluateArgs;

#[derive(Debug, Parser)]
#[command(
    name = "tierwise",
    about = "Tierwise approval policy CLI",
    long_about = "Evaluate transaction amounts against the configured approval tiers and supplemental rules.",
    after_help = "Examples:\n  tierwise evaluate --amount 10000.00 --category wire\n  tierwise tiers --json\n  tierwise doctor"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a tierwise.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Evaluate the approval requirements for one transaction")]
    Evaluate {
        #[arg(
            long,
            allow_hyphen_values = true,
            help = "Transaction amount in major units (e.g. 1250.00)"
        )]
        amount: String,
        #[arg(long, help = "Transaction category tag (e.g. wire, eft, transfer)")]
        category: Option<String>,
        #[arg(long, help = "Interpret --amount as an integer count of minor units")]
        minor: bool,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the configured approval tiers and supplemental rules")]
    Tiers {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, policy construction, and tier boundary coverage")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            ..LoadOptions::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    if let Err(error) = init_logging(&options) {
        eprintln!("{error:#}");
    }

    let result = match cli.command {
        Command::Evaluate { amount, category, minor, json } => commands::evaluate::run(
            options,
            &EvaluateArgs { amount, category, minor_units: minor, json },
        ),
        Command::Tiers { json } => commands::tiers::run(options, json),
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays parseable. Settings that fail to load
/// fall back to `warn`; the command itself reports the failure.
fn init_logging(options: &LoadOptions) -> anyhow::Result<()> {
    let (level, format) = match AppConfig::load_settings(options.clone()) {
        Ok(config) => {
            (config.logging.level.parse::<Level>().unwrap_or(Level::INFO), config.logging.format)
        }
        Err(_) => (Level::WARN, LogFormat::Compact),
    };

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|error| anyhow!("{error}")).context("failed to install tracing subscriber")
}
