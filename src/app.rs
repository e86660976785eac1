//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that parses the
//! CLI, loads settings, runs the chosen command and prints its report.

use clap::Parser;
use log::info;

use crate::analysis::model_fit::compare_models;
use crate::analysis::separations::{AnalyzeOptions, analyze_star};
use crate::cli::{AnalyzeArgs, Cli, Command, FitModelArgs};
use crate::config::{Settings, or_setting};
use crate::domain::ModelKind;
use crate::error::AppError;
use crate::io::{read_pairs, read_transitions};
use crate::report;

pub mod pipeline;

/// Parsed CLI, for binaries that set up logging before running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Default log filter for the verbosity flag; `RUST_LOG` takes precedence.
pub fn default_log_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Entry point for the `varcon` binary.
pub fn run(cli: Cli) -> Result<(), AppError> {
    let settings = Settings::from_env();
    match cli.command {
        Command::Convert(args) => {
            let rows = pipeline::run_convert(&args)?;
            print!("{}", report::format_conversion(args.formula, args.direction, &rows));
            Ok(())
        }
        Command::SelectPairs(args) => {
            let selection = pipeline::run_select_pairs(&args, &settings)?;
            print!("{}", report::format_pair_selection(&selection));
            Ok(())
        }
        Command::Analyze(args) => handle_analyze(args, &settings),
        Command::BuildDb(args) => {
            let (db, path) = pipeline::run_build_db(&args, &settings)?;
            println!(
                "Stellar database: {} stars × {} {:?} columns -> {}",
                db.stars.len(),
                db.labels.len(),
                db.columns,
                path.display()
            );
            Ok(())
        }
        Command::FitModel(args) => handle_fit_model(args, &settings),
        Command::SigmaSys(args) => {
            let (curves, plot) = pipeline::run_sigma_sys(&args, &settings)?;
            print!("{}", report::format_dependence(&curves));
            println!("Plot: {}", plot.display());
            Ok(())
        }
        Command::PairTable(args) => {
            let written = pipeline::run_pair_table(&args, &settings)?;
            for path in &written {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Pairs(args) => {
            let output = pipeline::run_pairs(&args, &settings)?;
            print!("{}", report::format_trend_summary(&output.trends));
            for s in &output.stability {
                print!("{}", report::format_stability(s));
            }
            print!("{}", report::format_star_diagnostics(&output.diagnostics));
            Ok(())
        }
    }
}

fn handle_analyze(args: AnalyzeArgs, settings: &Settings) -> Result<(), AppError> {
    // 1) Transition and pair lists.
    let transitions = read_transitions(&or_setting(args.transitions.as_deref(), settings.transitions_file()))?;
    let pairs = read_pairs(&or_setting(args.pairs.as_deref(), settings.pairs_file()))?;
    info!("{} transitions, {} pairs", transitions.len(), pairs.len());

    // 2) Aggregate the star.
    let options = AnalyzeOptions {
        suffix: args.suffix,
        write_csv: !args.no_csv,
        write_fit_info: !args.no_fit_info,
        plot: !args.no_plot,
    };
    let summary = analyze_star(&args.star_dir, &transitions, &pairs, &options)?;

    // 3) Report.
    print!("{}", report::format_analyze_summary(&summary));
    Ok(())
}

fn handle_fit_model(args: FitModelArgs, settings: &Settings) -> Result<(), AppError> {
    if let Some(label) = &args.compare {
        let db = pipeline::read_database(&args.database)?;
        let selection = compare_models(&db, label, args.era, &ModelKind::ALL)?;
        print!("{}", report::format_model_selection(label, args.era, &selection));
        return Ok(());
    }
    let (run, path) = pipeline::run_fit_model(&args, settings)?;
    print!("{}", report::format_model_fit_run(&run, args.top));
    println!("Parameters: {}", path.display());
    Ok(())
}
