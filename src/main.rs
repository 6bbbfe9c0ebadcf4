use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod error;
mod index;
mod indexer;

use cli::index::IndexArgs;
use config::LoggingConfig;
use error::IndexerError;

#[derive(Parser)]
#[command(name = "codebase-indexer")]
#[command(author = "Intent Project Team")]
#[command(version)]
#[command(about = "Compact, incremental codebase index for AI context windows", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Index arguments (shorthand for 'codebase-indexer index ...')
    #[command(flatten)]
    index: IndexArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project and write its index - default command
    Index(IndexArgs),

    /// List supported languages
    Languages,
}

fn env_filter(debug: bool, verbose: bool, configured: &str) -> EnvFilter {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug, verbose, &logging.level))
        .with_writer(std::io::stderr)
        .with_target(false);

    match logging.format.as_str() {
        "pretty" => builder.pretty().init(),
        "full" => builder.init(),
        _ => builder.compact().init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Index(cli.index));

    match command {
        Commands::Index(args) => {
            // Config loading logs through a scoped subscriber until the
            // configured one can be installed.
            let bootstrap = tracing_subscriber::fmt()
                .with_env_filter(env_filter(cli.debug, cli.verbose, "warn"))
                .with_writer(std::io::stderr)
                .with_target(false)
                .finish();
            let config = tracing::subscriber::with_default(bootstrap, || cli::index::resolve_config(&args))?;

            init_logging(cli.debug, cli.verbose, &config.logging);
            info!("codebase-indexer v{} starting...", env!("CARGO_PKG_VERSION"));
            cli::index::index_project(args, config).await?;
        }

        Commands::Languages => {
            init_logging(cli.debug, cli.verbose, &LoggingConfig::default());
            cli::languages::list_languages();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.downcast_ref::<IndexerError>().map(IndexerError::exit_code).unwrap_or(1);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(code as u8)
        }
    }
}
