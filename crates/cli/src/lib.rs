pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use cobuy_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "cobuy",
    about = "Cobuy co-purchase recommender CLI",
    long_about = "Record co-purchases, query suggestions, and operate the catalog and ranked store.",
    after_help = "Examples:\n  cobuy doctor --json\n  cobuy record --products 1,2,3\n  cobuy suggest --products 1,2 --max 4"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, catalog readiness, and ranked store connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Apply pending catalog migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo catalog and record its demo orders")]
    Seed,
    #[command(about = "Record one order's co-purchases")]
    Record {
        #[arg(long, help = "Comma-separated product ids, e.g. 1,2,3")]
        products: String,
    },
    #[command(about = "Suggest products frequently bought with the given products")]
    Suggest {
        #[arg(long, help = "Comma-separated seed product ids")]
        products: String,
        #[arg(long = "max", help = "Maximum number of suggestions (defaults to config)")]
        max_results: Option<usize>,
    },
    #[command(about = "Show the association list of one product")]
    Weights {
        #[arg(long)]
        product: String,
    },
    #[command(about = "Delete the association list of every catalog product")]
    Clear,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_logging() {
        eprintln!("{error:#}");
    }

    let result = match cli.command {
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Record { products } => commands::record::run(&products),
        Command::Suggest { products, max_results } => {
            commands::suggest::run(&products, max_results)
        }
        Command::Weights { product } => commands::weights::run(&product),
        Command::Clear => commands::clear::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the stderr subscriber described by `logging.*`, so stdout stays
/// reserved for command output. Falls back to defaults when config is invalid.
fn init_logging() -> anyhow::Result<()> {
    let config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!("failed to install log subscriber: {error}"))
}
