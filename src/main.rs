//! Voicescreen CLI - Parkinson's disease voice screening
//!
//! Command-line interface for the voicescreen pipeline.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use voicescreen::cli::{commands, Cli, Commands};
use voicescreen::config::AppConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Voicescreen v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_overrides(cli.model, cli.upload_dir);

    match cli.command {
        Commands::PredictAudio { file, json } => {
            let service = commands::build_service(&config)
                .with_context(|| format!("failed to load model {}", config.model_path.display()))?;
            commands::predict_audio(&service, &file, json)?;
        }
        Commands::PredictManual {
            fields,
            input,
            json,
        } => {
            let service = commands::build_service(&config)
                .with_context(|| format!("failed to load model {}", config.model_path.display()))?;
            commands::predict_manual(&service, fields, input.as_deref(), json)?;
        }
        Commands::Extract { file } => commands::extract(&file)
            .with_context(|| format!("failed to extract features from {}", file.display()))?,
        Commands::ModelInfo => commands::model_info(&config)?,
    }

    Ok(())
}
