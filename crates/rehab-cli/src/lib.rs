//! Rehab CLI
//!
//! Command-line driver for the rehabilitation motion engine. Pose frames are
//! read from recorded JSON Lines streams (one frame per line).
//!
//! # Usage
//!
//! ```bash
//! # Record a custom exercise from a demonstration
//! rehab calibrate "arm lift" --input demo.jsonl --default-sets 3
//!
//! # Assign it to a patient
//! rehab assign riley "arm lift" --reps 10 --sets 3
//!
//! # Score a session and save it to the patient's history
//! rehab track "arm lift" --input take.jsonl --patient riley --save
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod commands;

/// Rehabilitation motion engine command line
#[derive(Parser, Debug)]
#[command(name = "rehab")]
#[command(author, version, about = "Joint-angle rep counting and form scoring")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults plus REHAB__* environment when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store file, overriding the configured one
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count reps and score a recorded session
    Track(TrackArgs),

    /// Derive joint limits from a demonstration and save a custom exercise
    Calibrate(CalibrateArgs),

    /// Assign an exercise to a patient
    Assign(AssignArgs),

    /// List stored custom exercises
    Exercises,

    /// Show a patient's progress
    Progress(ProgressArgs),

    /// Display version information
    Version,
}

#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Built-in exercise (squat, pushup, curl, raise) or stored custom exercise
    pub exercise: String,

    /// Recorded pose stream
    #[arg(short, long)]
    pub input: PathBuf,

    /// Patient whose assignment and optimal range apply
    #[arg(short, long)]
    pub patient: Option<String>,

    /// Stop once this many reps are counted
    #[arg(short, long)]
    pub target_reps: Option<u32>,

    /// Optimal range lower bound (degrees)
    #[arg(long, requires = "opt_max")]
    pub opt_min: Option<f64>,

    /// Optimal range upper bound (degrees)
    #[arg(long, requires = "opt_min")]
    pub opt_max: Option<f64>,

    /// Countdown before scoring starts (seconds)
    #[arg(long)]
    pub countdown: Option<f64>,

    /// Wall-clock ceiling (seconds)
    #[arg(long)]
    pub max_duration: Option<f64>,

    /// Append the result to the patient's history
    #[arg(long, requires = "patient")]
    pub save: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Name of the custom exercise
    pub name: String,

    /// Recorded demonstration
    #[arg(short, long)]
    pub input: PathBuf,

    /// Sets per session when the patient has no assignment
    #[arg(long)]
    pub default_sets: Option<u32>,

    /// Optimal range lower bound on the primary joint (degrees)
    #[arg(long, requires = "opt_max")]
    pub opt_min: Option<f64>,

    /// Optimal range upper bound on the primary joint (degrees)
    #[arg(long, requires = "opt_min")]
    pub opt_max: Option<f64>,

    /// Countdown before recording starts (seconds)
    #[arg(long)]
    pub countdown: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct AssignArgs {
    pub patient: String,

    pub exercise: String,

    /// Reps per set
    #[arg(short, long)]
    pub reps: u32,

    /// Number of sets
    #[arg(short, long)]
    pub sets: Option<u32>,

    /// Patient-specific optimal range lower bound (degrees)
    #[arg(long, requires = "opt_max")]
    pub opt_min: Option<f64>,

    /// Patient-specific optimal range upper bound (degrees)
    #[arg(long, requires = "opt_min")]
    pub opt_max: Option<f64>,
}

#[derive(Args, Debug)]
pub struct ProgressArgs {
    pub patient: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_track() {
        let cli = Cli::parse_from([
            "rehab", "track", "squat", "--input", "take.jsonl", "--opt-min", "60", "--opt-max",
            "170", "-t", "10",
        ]);
        match cli.command {
            Commands::Track(args) => {
                assert_eq!(args.exercise, "squat");
                assert_eq!(args.target_reps, Some(10));
                assert_eq!((args.opt_min, args.opt_max), (Some(60.0), Some(170.0)));
                assert_eq!(args.format, OutputFormat::Text);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_save_requires_patient() {
        let parsed = Cli::try_parse_from(["rehab", "track", "squat", "-i", "x.jsonl", "--save"]);
        assert!(parsed.is_err());
    }
}
