//! CLI Module
//!
//! Command-line interface for the voicescreen screening pipeline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voicescreen - Parkinson's disease voice screening
#[derive(Parser, Debug)]
#[command(name = "voicescreen-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Persisted classifier model (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Directory for staged uploads (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub upload_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Screen a WAV or MP3 recording
    #[command(name = "predict-audio")]
    PredictAudio {
        /// Recording to screen
        file: PathBuf,

        /// Print a JSON report instead of the message
        #[arg(long)]
        json: bool,
    },

    /// Screen 22 manually entered measurements
    #[command(name = "predict-manual")]
    PredictManual {
        /// One measurement, e.g. --field MDVP_Fo_Hz=119.992
        #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// JSON object of measurements keyed by name
        #[arg(short, long, conflicts_with = "fields")]
        input: Option<PathBuf>,

        /// Print a JSON report instead of the message
        #[arg(long)]
        json: bool,
    },

    /// Print the features extracted from a recording
    #[command(name = "extract")]
    Extract {
        /// Recording to analyse
        file: PathBuf,
    },

    /// Describe the loaded classifier
    #[command(name = "model-info")]
    ModelInfo,
}

/// Parse a `NAME=VALUE` pair
fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}
