use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod doctor;
pub mod load;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and validate a prover executable.
    Probe(ProbeArgs),
    /// Load a file through a live session and print the responses.
    Load(LoadArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format).await,
        Command::Load(args) => load::run(args, format).await,
        Command::Doctor(args) => doctor::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Program name to search for on PATH.
    #[arg(default_value = "agda")]
    pub program: String,
    /// Explicit executable path (skips the PATH search).
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// File to load.
    pub file: PathBuf,
    /// Program name to search for on PATH.
    #[arg(long, default_value = "agda")]
    pub program: String,
    /// Explicit executable path (skips the PATH search).
    #[arg(long)]
    pub path: Option<PathBuf>,
    /// Give up if the turn has not completed in time (e.g. 60s, 500ms).
    #[arg(long, default_value = "60s")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s` / `500ms` / `2m` style durations.
pub fn parse_duration(text: &str) -> Option<std::time::Duration> {
    let text = text.trim();
    let (value, unit) = text.split_at(text.find(|c: char| c.is_ascii_alphabetic())?);
    let value: u64 = value.parse().ok()?;
    match unit {
        "ms" => Some(std::time::Duration::from_millis(value)),
        "s" => Some(std::time::Duration::from_secs(value)),
        "m" => Some(std::time::Duration::from_secs(value * 60)),
        _ => None,
    }
}
