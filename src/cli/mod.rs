//! Command-line parsing for the force-distance fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling and I/O code. Values given here override the run table.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::CurveMode;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fdfit", version, about = "Two-stage worm-like-chain fits of DNA force-distance curves")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every curve in the input directory and write results and plots.
    Run(RunArgs),
    /// Write synthetic tWLC pulling cycles as CSV.
    Simulate(SimulateArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Run table (`key value` rows). Defaults to `input.txt` when present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Parameter override table (`name value attribute [stage]` rows).
    /// Defaults to `default.txt` when present.
    #[arg(long, value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Directory of .csv/.h5 curve containers.
    #[arg(long, value_name = "DIR", env = "FDFIT_INPUT_DIR")]
    pub input: Option<PathBuf>,

    /// Directory for results and plots (created if missing).
    #[arg(long, value_name = "DIR", env = "FDFIT_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Which branch(es) of each cycle to fit.
    #[arg(long, value_enum)]
    pub curve: Option<CurveMode>,

    /// Plot force on a log10 axis.
    #[arg(long)]
    pub log_scale: bool,

    /// Untagged parameter rows applied to the initial-guess stage.
    #[arg(long, value_name = "N")]
    pub initial_rows: Option<usize>,

    /// Skip the SVG plots.
    #[arg(long)]
    pub no_plots: bool,

    /// No progress bars or terminal summary.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Directory to write `synthetic.csv` into (created if missing).
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,

    /// Number of pulling cycles.
    #[arg(long, default_value_t = 3)]
    pub curves: usize,

    /// Points per branch.
    #[arg(long, default_value_t = 200)]
    pub points: usize,

    /// Force noise standard deviation (pN).
    #[arg(long, default_value_t = 0.1)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Lowest force of the ramp (pN).
    #[arg(long, default_value_t = 0.5)]
    pub f_min: f64,

    /// Highest force of the ramp (pN).
    #[arg(long, default_value_t = 60.0)]
    pub f_max: f64,
}
