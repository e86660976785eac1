//! Formatted terminal output for each command.
//!
//! Formatting lives here so the analysis code only returns data and output
//! changes stay in one place.

use crate::analysis::dependence::DependenceCurve;
use crate::analysis::diagnostics::StarDiagnostics;
use crate::analysis::model_fit::{ColumnFit, ModelFitRun};
use crate::analysis::separations::AnalyzeSummary;
use crate::analysis::stability::BervStability;
use crate::analysis::trends::TrendSummary;
use crate::domain::{AirVacFormula, Direction, Era};
use crate::fit::ModelSelection;
use crate::lines::PairSelection;

/// The `top_n` columns with the largest `σ_sys`, largest first.
pub fn rank_by_scatter(columns: &[ColumnFit], top_n: usize) -> Vec<ColumnFit> {
    let mut sorted = columns.to_vec();
    sorted.sort_by(|a, b| b.sigma_sys.partial_cmp(&a.sigma_sys).unwrap_or(std::cmp::Ordering::Equal));
    sorted.truncate(top_n);
    sorted
}

pub fn format_conversion(formula: AirVacFormula, direction: Direction, rows: &[(f64, f64)]) -> String {
    let mut out = String::new();
    let (from, to) = match direction {
        Direction::AirToVac => ("air", "vacuum"),
        Direction::VacToAir => ("vacuum", "air"),
    };
    out.push_str(&format!("=== varcon - {from} to {to} ({formula:?}) ===\n"));
    out.push_str(&format!("{:>14} {:>14} {:>10}\n", format!("{from} (Å)"), format!("{to} (Å)"), "Δ (Å)"));
    for (input, output) in rows {
        out.push_str(&format!("{input:>14.4} {output:>14.4} {:>10.4}\n", output - input));
    }
    out
}

pub fn format_pair_selection(selection: &PairSelection) -> String {
    let mut out = String::new();
    out.push_str("=== varcon - line pair selection ===\n");
    out.push_str(&format!("Matched lines: {}\n", selection.n_matches));
    out.push_str(&format!("Fe I/II lines: {}\n", selection.n_iron));
    out.push_str(&format!("Unmatchable:   {}\n", selection.n_unmatchable));
    out.push_str(&format!("Pairs:         {}\n", selection.pairs.len()));
    let elements: Vec<&str> = selection.elements.iter().map(String::as_str).collect();
    out.push_str(&format!("Elements:      {}\n", elements.join(" ")));
    out
}

pub fn format_analyze_summary(summary: &AnalyzeSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== varcon - {} ===\n", summary.star));
    out.push_str(&format!(
        "Observations: n={} | pre={} | post={}\n",
        summary.n_obs,
        summary.n_pre,
        summary.n_obs - summary.n_pre
    ));
    out.push_str(&format!("Star file: {}\n\n", summary.star_file.display()));

    out.push_str(&format!(
        "{:<32} {:>5} {:>14} {:>10} {:>10} {:>8}\n",
        "pair", "n", "mean (m/s)", "EotWM", "EotM", "χ²_ν"
    ));
    out.push_str(&format!("{:-<32} {:-<5} {:-<14} {:-<10} {:-<10} {:-<8}\n", "", "", "", "", "", ""));
    for pair in &summary.pairs {
        match &pair.summary {
            Some(s) => out.push_str(&format!(
                "{:<32} {:>5} {:>14.3} {:>10.3} {:>10.3} {:>8.3}\n",
                truncate(&pair.label, 32),
                s.n,
                s.weighted_mean,
                s.eotwm,
                s.eotm,
                s.chi_squared_nu
            )),
            None => out.push_str(&format!("{:<32} {:>5}\n", truncate(&pair.label, 32), 0)),
        }
    }
    out
}

pub fn format_model_fit_run(run: &ModelFitRun, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== varcon - {} model fit ===\n", run.params.model.name()));
    for era in Era::ALL {
        let cols: Vec<&ColumnFit> = run.columns.iter().filter(|c| c.era == era).collect();
        if cols.is_empty() {
            continue;
        }
        let mean_sys = cols.iter().map(|c| c.sigma_sys).sum::<f64>() / cols.len() as f64;
        out.push_str(&format!("{era}: {} columns fitted | mean σ_sys={mean_sys:.3} m/s\n", cols.len()));
    }
    if !run.failures.is_empty() {
        out.push_str(&format!("Failed: {} column/era combinations\n", run.failures.len()));
    }

    out.push_str("\nLargest σ_sys:\n");
    out.push_str(&format!(
        "{:<24} {:<5} {:>7} {:>7} {:>10} {:>8}\n",
        "label", "era", "stars", "kept", "σ_sys", "χ²_ν"
    ));
    for c in rank_by_scatter(&run.columns, top_n) {
        out.push_str(&format!(
            "{:<24} {:<5} {:>7} {:>7} {:>10.3} {:>8.3}\n",
            truncate(&c.label, 24),
            c.era.as_str(),
            c.n_stars,
            c.n_kept,
            c.sigma_sys,
            c.chi_squared_nu
        ));
    }
    out
}

/// Model diagnostics of a comparison; the chosen model is starred.
pub fn format_model_selection(label: &str, era: Era, selection: &ModelSelection) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== varcon - model comparison: {label} ({era}) ===\n"));
    for fit in &selection.fits {
        let chosen = if fit.model == selection.best.model { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<20} χ²={:.3} χ²_ν={:.3} BIC={:.3}\n",
            fit.model.name(),
            fit.chi_squared,
            fit.chi_squared_nu,
            fit.bic
        ));
    }
    for (kind, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.name()));
    }
    out.push_str(&format!("\nChosen: {}\n", selection.best.model.name()));
    out.push_str(&format!("- betas: {}\n", fmt_vec(&selection.best.betas)));
    out
}

pub fn format_dependence(curves: &[DependenceCurve]) -> String {
    let mut out = String::new();
    out.push_str("=== varcon - σ_sys dependence ===\n");
    for c in curves {
        out.push_str(&format!("{} {:?} ({} labels)\n", c.era, c.parameter, c.n_labels));
        for ((x, m), s) in c.midpoints.iter().zip(&c.mean_sigma_sys).zip(&c.std_sigma_sys) {
            out.push_str(&format!("  {x:>10.3} {m:>10.3} ± {s:.3}\n"));
        }
    }
    out
}

pub fn format_trend_summary(summary: &TrendSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== varcon - pair trends ({} plots) ===\n", summary.plots.len()));
    out.push_str(&format!("{:<32} {:<5} {:>6} {:>12} {:>10}\n", "pair", "era", "stars", "mean (m/s)", "σ_sys"));
    for s in &summary.scatters {
        out.push_str(&format!(
            "{:<32} {:<5} {:>6} {:>12.3} {:>10.3}\n",
            truncate(&s.label, 32),
            s.era.as_str(),
            s.n_stars,
            s.weighted_mean,
            s.sigma_sys
        ));
    }
    out
}

pub fn format_stability(s: &BervStability) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {}: mean={:.3} m/s σ_sys={:.3} m/s\n",
        s.star, s.label, s.era, s.weighted_mean, s.sigma_sys
    ));
    for b in &s.bins {
        out.push_str(&format!(
            "  BERV {:>6.1} km/s  n={:<3} {:>10.3} ± {:.3}\n",
            b.centre / 1000.0,
            b.n,
            b.weighted_mean,
            b.eotwm
        ));
    }
    out
}

pub fn format_star_diagnostics(d: &StarDiagnostics) -> String {
    let mut out = String::new();
    for c in &d.separation {
        out.push_str(&format!(
            "{} {}: {} pairs, model offset {:.3} ± {:.3} m/s, χ²_ν={:.2}\n",
            c.star,
            c.era,
            c.points.len(),
            c.weighted_mean,
            c.eotwm,
            c.chi_squared_nu
        ));
    }
    for c in &d.duplicates {
        out.push_str(&format!(
            "{} {}: {} duplicate pairs, RMS {:.3} (raw) {:.3} (model) m/s\n",
            c.star,
            c.era,
            c.pairs.len(),
            c.separation_rms,
            c.offset_rms
        ));
    }
    for c in &d.depth {
        out.push_str(&format!(
            "{} {}: {} pairs with depths, χ²_ν={:.2}\n",
            c.star,
            c.era,
            c.points.len(),
            c.chi_squared_nu
        ));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6e}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelParams;
    use crate::domain::ModelKind;

    fn column(label: &str, sigma_sys: f64) -> ColumnFit {
        ColumnFit {
            label: label.to_string(),
            era: Era::Pre,
            n_stars: 20,
            n_kept: 19,
            sigma_sys,
            chi_squared_nu: 1.0,
            iterations: 3,
        }
    }

    #[test]
    fn rank_by_scatter_largest_first() {
        let cols = vec![column("a", 1.0), column("b", 5.0), column("c", 3.0)];
        let ranked = rank_by_scatter(&cols, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].label, "b");
        assert_eq!(ranked[1].label, "c");
    }

    #[test]
    fn model_fit_summary_lists_eras() {
        let run = ModelFitRun {
            params: ModelParams::new(ModelKind::Linear),
            columns: vec![column("4217.791Fe1_16", 2.0), column("4219.893V1_16", 4.0)],
            failures: vec![("x".to_string(), Era::Post, "too few".to_string())],
        };
        let text = format_model_fit_run(&run, 5);
        assert!(text.contains("linear model fit"));
        assert!(text.contains("pre: 2 columns fitted | mean σ_sys=3.000 m/s"));
        assert!(text.contains("Failed: 1"));
        assert!(!text.contains("post:"));
    }

    #[test]
    fn conversion_table_shows_difference() {
        let text = format_conversion(AirVacFormula::Eso, Direction::AirToVac, &[(5000.0, 5001.3945)]);
        assert!(text.contains("air to vacuum"));
        assert!(text.contains("1.3945"));
    }

    #[test]
    fn empty_diagnostics_print_nothing() {
        assert!(format_star_diagnostics(&StarDiagnostics::default()).is_empty());
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
