mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use ensemble_stats::config::AnalysisConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AnalysisConfig::from_env()?;
    tracing::debug!(
        time_column = %config.time_column,
        id_column = %config.id_column,
        top_n = config.top_n,
        "resolved configuration"
    );

    match cli.command {
        Commands::Statistics(args) => commands::statistics(args, &config),
        Commands::Correlate(args) => commands::correlate_columns(args, &config),
        Commands::ParameterResponse(args) => commands::parameter_response(args, &config),
    }
}
