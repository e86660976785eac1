//! Shared command workflows.
//!
//! Each function runs one command end to end and returns what it computed,
//! leaving printing to [`crate::app`]. Paths not given on the command line
//! come from [`Settings`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::analysis::database::{StellarDatabase, build_database, database_file_name, load_stars};
use crate::analysis::dependence::{DEPENDENCE_PARAMETERS, DependenceCurve, dependence_panels, parameter_dependence};
use crate::analysis::model_fit::{ModelFitOptions, ModelFitRun, fit_database};
use crate::analysis::pair_table::write_pair_tables;
use crate::analysis::diagnostics::{StarDiagnostics, render_star_diagnostics, star_diagnostics};
use crate::analysis::stability::{BERV_N_SIGMA, BervStability, berv_stability, stability_panel};
use crate::analysis::trends::{TrendSummary, plot_pair_trends};
use crate::cli::{BuildDbArgs, ConvertArgs, FitModelArgs, PairTableArgs, PairsArgs, SelectPairsArgs, SigmaSysArgs};
use crate::config::{Settings, or_setting};
use crate::domain::{Era, StellarProperties, Transition, TransitionPair};
use crate::error::AppError;
use crate::io::{load_line_list, load_star_properties, read_json, read_pairs, write_json};
use crate::lines::{PairSelection, SelectionParams, read_gfall, read_spectral_mask, select_pairs, write_line_pair_file, write_offset_histogram};
use crate::models::ModelParams;
use crate::plot::render_panels;
use crate::spectral::convert;
use crate::star::Star;
use crate::star::record::STAR_FILE_NAME;
use crate::units::{Velocity, VelocityExt};

/// Load star properties, logging skipped rows.
pub fn load_properties(path: &Path) -> Result<Vec<StellarProperties>, AppError> {
    let ingested = load_star_properties(path)?;
    for err in &ingested.row_errors {
        warn!(
            "{} line {}{}: {}",
            path.display(),
            err.line,
            err.id.as_deref().map(|id| format!(" ({id})")).unwrap_or_default(),
            err.message
        );
    }
    info!(
        "Read {} of {} star property rows from {}",
        ingested.rows_used,
        ingested.rows_read,
        path.display()
    );
    Ok(ingested.records)
}

/// `(input, converted)` per wavelength.
pub fn run_convert(args: &ConvertArgs) -> Result<Vec<(f64, f64)>, AppError> {
    args.wavelengths
        .iter()
        .map(|&wl| {
            convert(wl, args.formula, args.direction)
                .map(|out| (wl, out))
                .map_err(AppError::from)
        })
        .collect()
}

/// Distinct transitions of `pairs`, ordered by wavelength.
pub fn pair_transitions(pairs: &[TransitionPair]) -> Vec<Transition> {
    let mut by_label: BTreeMap<String, Transition> = BTreeMap::new();
    for t in pairs.iter().flat_map(|p| p.iter()) {
        by_label.entry(t.label()).or_insert_with(|| t.clone());
    }
    let mut transitions: Vec<Transition> = by_label.into_values().collect();
    transitions.sort_by(|a, b| a.wavelength_aa().total_cmp(&b.wavelength_aa()));
    transitions
}

pub fn run_select_pairs(args: &SelectPairsArgs, settings: &Settings) -> Result<PairSelection, AppError> {
    // 1) Inputs.
    let lines = load_line_list(&args.lines)?;
    for err in &lines.row_errors {
        warn!("{} line {}: {}", args.lines.display(), err.line, err.message);
    }
    let kurucz = read_gfall(&args.kurucz)?;
    let mask = match &args.mask {
        Some(path) => read_spectral_mask(path)?,
        None => Vec::new(),
    };
    info!(
        "{} lines, {} Kurucz lines, {} masked regions",
        lines.records.len(),
        kurucz.len(),
        mask.len()
    );

    // 2) Selection.
    let params = SelectionParams {
        min_depth: args.min_depth,
        max_depth: args.max_depth,
        velocity_separation: Velocity::from_kilometers_per_second(args.max_separation),
        depth_difference: args.depth_difference,
        vacuum: !args.air,
        ..SelectionParams::default()
    };
    let selection = select_pairs(&lines.records, &kurucz, &mask, &params)?;

    // 3) Outputs.
    write_line_pair_file(&args.out, &selection, params.vacuum)?;
    let offsets_plot = args.out.with_file_name("kurucz_offsets.svg");
    write_offset_histogram(&offsets_plot, &selection)?;
    let pairs_file = or_setting(args.pairs_json.as_deref(), settings.pairs_file());
    write_json(&pairs_file, &selection.pairs, "pair list")?;
    let transitions_file = pairs_file.with_file_name("transitions.json");
    write_json(&transitions_file, &pair_transitions(&selection.pairs), "transition list")?;
    info!(
        "Wrote {}, {} and {}",
        offsets_plot.display(),
        pairs_file.display(),
        transitions_file.display()
    );
    Ok(selection)
}

pub fn run_build_db(args: &BuildDbArgs, settings: &Settings) -> Result<(StellarDatabase, PathBuf), AppError> {
    let stars = load_stars(&args.stars)?;
    let properties = load_properties(&args.properties)?;
    let db = build_database(&stars, &properties, args.columns)?;
    let out = or_setting(
        args.out.as_deref(),
        settings.databases_dir().join(database_file_name(args.columns)),
    );
    write_json(&out, &db, "stellar database")?;
    info!("Database of {} stars × {} labels written to {}", db.stars.len(), db.labels.len(), out.display());
    Ok((db, out))
}

pub fn read_database(path: &Path) -> Result<StellarDatabase, AppError> {
    read_json(path, "stellar database")
}

/// Default parameters file of a model next to the databases.
pub fn params_file(settings: &Settings, options: &ModelFitOptions) -> PathBuf {
    settings
        .databases_dir()
        .join(format!("{}_params.json", options.model.name()))
}

pub fn run_fit_model(args: &FitModelArgs, settings: &Settings) -> Result<(ModelFitRun, PathBuf), AppError> {
    let db = read_database(&args.database)?;
    let options = ModelFitOptions {
        model: args.model,
        n_sigma: args.n_sigma,
        tolerance: args.tolerance,
    };
    let run = fit_database(&db, &options)?;
    let out = or_setting(args.out.as_deref(), params_file(settings, &options));
    write_json(&out, &run.params, "model parameters")?;
    Ok((run, out))
}

/// Dependence curves for every parameter and era, plotted as eras × parameters.
pub fn run_sigma_sys(args: &SigmaSysArgs, settings: &Settings) -> Result<(Vec<DependenceCurve>, PathBuf), AppError> {
    let db = read_database(&args.database)?;
    let curves: Vec<DependenceCurve> = Era::ALL
        .iter()
        .flat_map(|era| {
            DEPENDENCE_PARAMETERS
                .iter()
                .map(|p| parameter_dependence(&db, args.model, *p, *era, args.nbins))
                .collect::<Vec<_>>()
        })
        .collect();
    if curves.iter().all(|c| c.n_labels == 0) {
        return Err(AppError::new(3, "No label could be fitted in either era."));
    }
    let plot = or_setting(args.plot.as_deref(), settings.plots_dir().join("sigma_sys_dependence.svg"));
    render_panels(&plot, &dependence_panels(&curves), Era::ALL.len(), DEPENDENCE_PARAMETERS.len(), (1800, 1000))?;
    Ok((curves, plot))
}

pub fn run_pair_table(args: &PairTableArgs, settings: &Settings) -> Result<Vec<PathBuf>, AppError> {
    let mut stars = load_stars(&args.stars)?;
    let properties = load_properties(&args.properties)?;
    let params: ModelParams = read_json(&args.params, "model parameters")?;
    let out_dir = or_setting(args.out_dir.as_deref(), settings.pair_separations_dir());
    write_pair_tables(&out_dir, &mut stars, &properties, &params)
}

/// Outputs of the `pairs` command.
#[derive(Debug, Clone, Default)]
pub struct PairsOutput {
    pub trends: TrendSummary,
    pub stability: Vec<BervStability>,
    pub diagnostics: StarDiagnostics,
}

/// Load the star saved in `dir` and apply `params` with its properties.
pub fn load_corrected_star(dir: &Path, properties: &[StellarProperties], params: &ModelParams) -> Result<Star, AppError> {
    let mut star = Star::load(&dir.join(STAR_FILE_NAME))?;
    let props = properties
        .iter()
        .find(|p| p.name == star.name)
        .ok_or_else(|| AppError::new(3, format!("{}: no stellar properties", star.name)))?;
    star.apply_model(params, props);
    Ok(star)
}

/// BERV stability of every pair column of one star, in both eras.
///
/// The model must already be applied to `star`.
pub fn star_stability(star: &Star, tolerance: f64) -> Vec<BervStability> {
    let mut out = Vec::new();
    for p_col in 0..star.pair_labels().len() {
        for era in Era::ALL {
            if !star.has_obs(era) {
                continue;
            }
            match berv_stability(star, p_col, era, BERV_N_SIGMA, tolerance) {
                Ok(s) => out.push(s),
                Err(e) => warn!("{}", e),
            }
        }
    }
    out
}

pub fn run_pairs(args: &PairsArgs, settings: &Settings) -> Result<PairsOutput, AppError> {
    let tables = or_setting(args.tables.as_deref(), settings.pair_separations_dir());
    let plot_dir = or_setting(args.plot_dir.as_deref(), settings.plots_dir().join("pairs"));
    let properties = match &args.properties {
        Some(path) => load_properties(path)?,
        None => Vec::new(),
    };
    let trends = plot_pair_trends(&tables, &properties, &plot_dir, args.n_sigma, args.tolerance)?;
    let mut output = PairsOutput {
        trends,
        ..PairsOutput::default()
    };

    let Some(dir) = &args.star else {
        return Ok(output);
    };
    let Some(params_path) = args.params.as_deref() else {
        return Err(AppError::new(2, "--star needs the model parameters (--params)."));
    };
    let params: ModelParams = read_json(params_path, "model parameters")?;
    let star = load_corrected_star(dir, &properties, &params)?;

    // 1) BERV stability per pair column and era.
    output.stability = star_stability(&star, args.tolerance);
    for s in &output.stability {
        let out = plot_dir
            .join("berv")
            .join(&star.name)
            .join(format!("{}_{}.svg", s.label, s.era));
        render_panels(&out, &[stability_panel(s)], 1, 1, (900, 700))?;
    }

    // 2) Diagnostics of the model-corrected offsets.
    let pairs = read_pairs(&or_setting(args.pairs.as_deref(), settings.pairs_file()))?;
    output.diagnostics = star_diagnostics(&star, &params, &pairs);
    let written = render_star_diagnostics(&plot_dir.join("diagnostics").join(&star.name), &output.diagnostics)?;
    info!("{}: {} diagnostic plots", star.name, written.len());
    Ok(output)
}
