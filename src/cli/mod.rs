//! Command-line parsing for `varcon`.
//!
//! Argument parsing and command dispatch are kept apart from the analysis
//! code; handlers live in [`crate::app`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::analysis::database::ColumnKind;
use crate::domain::{AirVacFormula, Direction, Era, ModelKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "varcon",
    version,
    about = "Line-pair velocity separations across HARPS stars"
)]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert wavelengths (Å) between air and vacuum.
    Convert(ConvertArgs),
    /// Select transition pairs from a line list and the Kurucz catalogue.
    SelectPairs(SelectPairsArgs),
    /// Aggregate one star's fits into pair separations and `star.json`.
    Analyze(AnalyzeArgs),
    /// Build a stellar database from many stars.
    BuildDb(BuildDbArgs),
    /// Fit a stellar-parameter model to every column of a database.
    FitModel(FitModelArgs),
    /// Bin σ_sys of model residuals by stellar parameter.
    SigmaSys(SigmaSysArgs),
    /// Write per-pair tables of separations across stars.
    PairTable(PairTableArgs),
    /// Plot trends of pair separations.
    Pairs(PairsArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    /// Wavelengths in Å.
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    pub wavelengths: Vec<f64>,

    #[arg(long, value_enum, default_value_t = AirVacFormula::Eso)]
    pub formula: AirVacFormula,

    #[arg(long, value_enum, default_value_t = Direction::AirToVac)]
    pub direction: Direction,
}

#[derive(Debug, Args, Clone)]
pub struct SelectPairsArgs {
    /// BRASS line list (CSV).
    #[arg(long, value_name = "CSV")]
    pub lines: PathBuf,

    /// Kurucz `gfall` catalogue.
    #[arg(long, value_name = "FILE")]
    pub kurucz: PathBuf,

    /// Spectral mask of regions to avoid.
    #[arg(long, value_name = "FILE")]
    pub mask: Option<PathBuf>,

    /// Output line-pair file.
    #[arg(long, short, value_name = "FILE")]
    pub out: PathBuf,

    /// Also write the selected pairs as JSON (defaults to the configured pairs file).
    #[arg(long, value_name = "JSON")]
    pub pairs_json: Option<PathBuf>,

    #[arg(long, default_value_t = 0.15)]
    pub min_depth: f64,

    #[arg(long, default_value_t = 0.9)]
    pub max_depth: f64,

    /// Largest velocity separation between partners (km/s).
    #[arg(long, default_value_t = 800.0)]
    pub max_separation: f64,

    /// Largest depth difference between partners.
    #[arg(long, default_value_t = 0.2)]
    pub depth_difference: f64,

    /// Report air wavelengths instead of vacuum.
    #[arg(long)]
    pub air: bool,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Star directory holding one subdirectory per observation.
    pub star_dir: PathBuf,

    /// Fit table suffix (`fits_<suffix>.csv`).
    #[arg(long, default_value = "gaussian")]
    pub suffix: String,

    /// Transitions JSON (defaults to the configured transitions file).
    #[arg(long, value_name = "JSON")]
    pub transitions: Option<PathBuf>,

    /// Pairs JSON (defaults to the configured pairs file).
    #[arg(long, value_name = "JSON")]
    pub pairs: Option<PathBuf>,

    #[arg(long)]
    pub no_csv: bool,

    #[arg(long)]
    pub no_fit_info: bool,

    #[arg(long)]
    pub no_plot: bool,
}

#[derive(Debug, Args, Clone)]
pub struct BuildDbArgs {
    /// Directory of star directories, each with a `star.json`.
    #[arg(long, value_name = "DIR")]
    pub stars: PathBuf,

    /// Star properties CSV.
    #[arg(long, value_name = "CSV")]
    pub properties: PathBuf,

    #[arg(long, value_enum, default_value_t = ColumnKind::Transitions)]
    pub columns: ColumnKind,

    /// Output file (defaults to the configured databases directory).
    #[arg(long, short, value_name = "JSON")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FitModelArgs {
    #[arg(long, value_name = "JSON")]
    pub database: PathBuf,

    #[arg(long, value_enum, default_value_t = ModelKind::QuadraticMagnitude)]
    pub model: ModelKind,

    /// Outlier rejection threshold in total errors.
    #[arg(long, default_value_t = 4.0)]
    pub n_sigma: f64,

    /// σ_sys tolerance (m/s).
    #[arg(long, default_value_t = 0.001)]
    pub tolerance: f64,

    /// Parameters file to write (defaults to `<databases>/<model>_params.json`).
    #[arg(long, short, value_name = "JSON")]
    pub out: Option<PathBuf>,

    /// Compare all models by BIC on this label instead of fitting.
    #[arg(long, value_name = "LABEL")]
    pub compare: Option<String>,

    /// Era of the comparison.
    #[arg(long, value_enum, default_value_t = Era::Pre)]
    pub era: Era,

    /// Show the N columns with the largest σ_sys.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Args, Clone)]
pub struct SigmaSysArgs {
    #[arg(long, value_name = "JSON")]
    pub database: PathBuf,

    #[arg(long, value_enum, default_value_t = ModelKind::QuadraticMagnitude)]
    pub model: ModelKind,

    /// Quantile bins per parameter instead of the fixed default bins.
    #[arg(long)]
    pub nbins: Option<usize>,

    /// Output plot (defaults to `<plots>/sigma_sys_dependence.svg`).
    #[arg(long, value_name = "SVG")]
    pub plot: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PairTableArgs {
    #[arg(long, value_name = "DIR")]
    pub stars: PathBuf,

    #[arg(long, value_name = "CSV")]
    pub properties: PathBuf,

    /// Model parameters file written by `fit-model`.
    #[arg(long, value_name = "JSON")]
    pub params: PathBuf,

    /// Output directory (defaults to the configured pair separation directory).
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PairsArgs {
    /// Directory of pair tables (defaults to the configured pair separation directory).
    #[arg(long, value_name = "DIR")]
    pub tables: Option<PathBuf>,

    /// Star properties CSV, for distances and the model of `--star`.
    #[arg(long, value_name = "CSV")]
    pub properties: Option<PathBuf>,

    /// Plot directory (defaults to `<plots>/pairs`).
    #[arg(long, value_name = "DIR")]
    pub plot_dir: Option<PathBuf>,

    /// Also check this star directory's `star.json`: BERV stability and
    /// diagnostics of its model-corrected pair offsets.
    #[arg(long, value_name = "DIR", requires_all = ["params", "properties"])]
    pub star: Option<PathBuf>,

    /// Model parameters file written by `fit-model`, applied to `--star`.
    #[arg(long, value_name = "JSON")]
    pub params: Option<PathBuf>,

    /// Pair list with member depths (defaults to the configured pairs file).
    #[arg(long, value_name = "JSON")]
    pub pairs: Option<PathBuf>,

    #[arg(long, default_value_t = 4.0)]
    pub n_sigma: f64,

    #[arg(long, default_value_t = 0.001)]
    pub tolerance: f64,
}
