//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - merges the run table, parameter table, environment and flags into a `RunConfig`
//! - runs the pipeline and prints the batch summary

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{Command, RunArgs, SimulateArgs};
use crate::config::{
    DEFAULT_INITIAL_ROWS, InputTable, ParameterTable, RunConfig, read_input_table, read_parameter_table,
};
use crate::data::{SynthConfig, generate_cycles, write_synthetic_csv};
use crate::error::AppError;

pub mod pipeline;

const DEFAULT_RUN_TABLE: &str = "input.txt";
const DEFAULT_PARAM_TABLE: &str = "default.txt";
const SYNTHETIC_FILE: &str = "synthetic.csv";

/// Entry point for the `fdfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is the normal case.
    dotenvy::dotenv().ok();
    init_logging();

    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // Tests may initialize more than once.
    let _ = env_logger::Builder::from_env(env).format_timestamp(None).try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = resolve_run_config(&args)?;
    let run = pipeline::run_pipeline(&config)?;

    if !args.quiet {
        println!(
            "{}",
            crate::report::format_batch_summary(
                run.n_curves,
                run.samples.len(),
                &run.outcome.fits,
                &run.outcome.failures
            )
        );
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        curves: args.curves,
        points: args.points,
        noise: args.noise,
        seed: args.seed,
        f_min: args.f_min,
        f_max: args.f_max,
        ..SynthConfig::default()
    };
    let cycles = generate_cycles(&config)?;

    std::fs::create_dir_all(&args.output).map_err(|e| {
        AppError::config(format!("Failed to create output directory '{}': {e}", args.output.display()))
    })?;
    let path = args.output.join(SYNTHETIC_FILE);
    write_synthetic_csv(&path, &cycles)?;
    log::info!("Wrote {} synthetic cycle(s) to {}", cycles.len(), path.display());
    Ok(())
}

/// Build the run configuration.
///
/// Precedence, highest first: CLI flags, environment (`FDFIT_INPUT_DIR`,
/// `FDFIT_OUTPUT_DIR`, folded into the flags by clap), the run table.
pub fn resolve_run_config(args: &RunArgs) -> Result<RunConfig, AppError> {
    let table = match table_path(args.config.as_deref(), DEFAULT_RUN_TABLE)? {
        Some(path) => read_input_table(&path)?,
        None => InputTable::default(),
    };

    let input_dir = args
        .input
        .clone()
        .or(table.input_dir)
        .ok_or_else(|| AppError::config("No input directory (set input_dir, --input or FDFIT_INPUT_DIR)."))?;
    let output_dir = args
        .output
        .clone()
        .or(table.output_dir)
        .ok_or_else(|| AppError::config("No output directory (set output_dir, --output or FDFIT_OUTPUT_DIR)."))?;

    let initial_rows = args
        .initial_rows
        .or(table.initial_rows)
        .unwrap_or(DEFAULT_INITIAL_ROWS);
    let params = match table_path(args.params.as_deref(), DEFAULT_PARAM_TABLE)? {
        Some(path) => {
            let params = read_parameter_table(&path, initial_rows)?;
            params.validate(&path.display().to_string())?;
            log::info!("{}: {} parameter override(s)", path.display(), params.rows.len());
            params
        }
        None => {
            log::info!("No parameter table; fitting with model defaults.");
            ParameterTable::default()
        }
    };

    Ok(RunConfig {
        input_dir,
        output_dir,
        mode: args.curve.or(table.mode).unwrap_or(crate::domain::CurveMode::Extension),
        log_scale: args.log_scale || table.log_scale.unwrap_or(false),
        plots: !args.no_plots,
        progress: !args.quiet,
        params,
    })
}

/// An explicit path must exist; the default is used only when present.
fn table_path(explicit: Option<&Path>, default: &str) -> Result<Option<PathBuf>, AppError> {
    match explicit {
        Some(p) if p.is_file() => Ok(Some(p.to_path_buf())),
        Some(p) => Err(AppError::config(format!("Table '{}' does not exist.", p.display()))),
        None => {
            let p = PathBuf::from(default);
            Ok(p.is_file().then_some(p))
        }
    }
}

/// Rewrite argv so `fdfit` defaults to `fdfit run`.
///
/// Rules:
/// - `fdfit`                         -> `fdfit run`
/// - `fdfit --input d ...`           -> `fdfit run --input d ...`
/// - `fdfit --help/--version/-h`     -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "simulate");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}
