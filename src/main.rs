//! Crop yield - Main Entry Point
//!
//! Fits and evaluates sugarcane yield regressors from the command line.

use clap::Parser;
use crop_yield::cli::{cmd_config, cmd_info, cmd_run, resolve_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crop_yield=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            preset,
            config,
            data,
            output_dir,
            no_plots,
        } => {
            let config = resolve_config(
                &preset,
                config.as_deref(),
                data.as_deref(),
                output_dir.as_deref(),
                no_plots,
            )?;
            cmd_run(config)?;
        }
        Commands::Config { preset } => {
            cmd_config(&preset)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
