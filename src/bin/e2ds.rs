//! `varcon-e2ds`: calibrate HARPS e2ds frames and fit transitions in them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rayon::prelude::*;

use varcon::config::{Settings, or_setting};
use varcon::domain::Transition;
use varcon::error::AppError;
use varcon::fit::fit_transition;
use varcon::io::{fit_table_path, read_transitions, write_fit_table};
use varcon::obs2d::ScienceFrame;
use varcon::obs2d::fits::open_science;

#[derive(Debug, Parser)]
#[command(name = "varcon-e2ds", version, about = "Calibrate and fit HARPS e2ds spectra")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory of blaze files (defaults to VARCON_BLAZE_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    blaze_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write calibrated WAVE/FLUX/ERR extensions into each file.
    Calibrate(CalibrateArgs),
    /// Fit every transition in each file and write one fit table per observation.
    Fit(FitArgs),
}

#[derive(Debug, Args)]
struct CalibrateArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Recompute the arrays even when the extensions exist.
    #[arg(long)]
    update: bool,
}

#[derive(Debug, Args)]
struct FitArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Transitions JSON (defaults to the configured transitions file).
    #[arg(long, value_name = "JSON")]
    transitions: Option<PathBuf>,

    /// Root of the per-star output (`<out>/<object>/<observation>/`).
    #[arg(long, value_name = "DIR")]
    out_dir: PathBuf,

    #[arg(long, default_value = "gaussian")]
    suffix: String,
}

fn open(path: &Path, blaze_dir: &Path, update: bool) -> Result<ScienceFrame, AppError> {
    open_science(path, blaze_dir, update).map_err(AppError::from)
}

fn fit_file(path: &Path, blaze_dir: &Path, transitions: &[Transition], args: &FitArgs) -> Result<PathBuf, AppError> {
    let frame = open(path, blaze_dir, false)?;
    let mut fits = Vec::new();
    for transition in transitions {
        for &order in &transition.orders_to_fit_in {
            match fit_transition(&frame, transition, order) {
                Ok(fit) => fits.push(fit),
                Err(e) => warn!("{}: {} in order {order}: {e}", frame.file.observation_name(), transition.label()),
            }
        }
    }
    if fits.is_empty() {
        return Err(AppError::new(3, format!("{}: no transition could be fitted", path.display())));
    }
    let star_dir = args.out_dir.join(frame.file.object_name()?);
    let out = fit_table_path(&star_dir, &frame.file.observation_name(), &args.suffix);
    write_fit_table(&out, &fits)?;
    info!("{}: {} fits -> {}", path.display(), fits.len(), out.display());
    Ok(out)
}

fn run(cli: Cli) -> Result<(), AppError> {
    let settings = Settings::from_env();
    let blaze_dir = or_setting(cli.blaze_dir.as_deref(), settings.blaze_dir.clone());

    let failures = match &cli.command {
        Command::Calibrate(args) => args
            .files
            .par_iter()
            .filter_map(|path| open(path, &blaze_dir, args.update).err().map(|e| (path, e)))
            .collect::<Vec<_>>(),
        Command::Fit(args) => {
            let transitions =
                read_transitions(&or_setting(args.transitions.as_deref(), settings.transitions_file()))?;
            args.files
                .par_iter()
                .filter_map(|path| fit_file(path, &blaze_dir, &transitions, args).err().map(|e| (path, e)))
                .collect::<Vec<_>>()
        }
    };

    for (path, err) in &failures {
        warn!("{}: {err}", path.display());
    }
    let total = match &cli.command {
        Command::Calibrate(args) => args.files.len(),
        Command::Fit(args) => args.files.len(),
    };
    println!("{} of {total} files processed", total - failures.len());
    match failures.first() {
        Some((_, err)) if failures.len() == total => Err(err.clone()),
        _ => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(varcon::app::default_log_level(cli.verbose)),
    )
    .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
