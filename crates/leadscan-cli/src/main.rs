mod scan;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::scan::ScanArgs;

#[derive(Debug, Parser)]
#[command(name = "leadscan-cli")]
#[command(about = "Find local businesses that have no website of their own")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan the configured sources and print the result as JSON on stdout.
    Scan(ScanArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut config = leadscan_core::load_scan_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Scan(args) => {
            args.apply(&mut config)?;
            scan::run_scan(&config, args.all).await
        }
    }
}

#[cfg(test)]
mod tests;
