//! Stellar-model selection using BIC with guardrails.
//!
//! For one transition the tool fits each candidate model and computes
//! `BIC = χ² + k ln(n)`.
//!
//! Selection rules:
//! 1. Exclude underdetermined models: require `n >= k + 5`
//! 2. Choose the model with minimum BIC
//! 3. If ΔBIC < 2 between the best and a simpler model, pick the simpler model

use crate::domain::ModelKind;
use crate::fit::FitError;
use crate::fit::fitter::{ModelFit, fit_model};
use crate::models::StellarCoords;

/// Minimum number of extra observations beyond parameter count.
const MIN_N_BUFFER: usize = 5;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub best: ModelFit,
    /// Fits for all attempted models (after guardrails).
    pub fits: Vec<ModelFit>,
    /// Any models that were skipped and why (for diagnostics).
    pub skipped: Vec<(ModelKind, String)>,
}

/// Fit every candidate model and select the best.
pub fn select_model(
    candidates: &[ModelKind],
    coords: &[StellarCoords],
    values: &[f64],
    errors: &[f64],
) -> Result<ModelSelection, FitError> {
    let n = coords.len();
    let mut fits = Vec::new();
    let mut skipped = Vec::new();

    for &kind in candidates {
        let k = kind.param_count();
        if n < k + MIN_N_BUFFER {
            skipped.push((
                kind,
                format!("Underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
            ));
            continue;
        }
        match fit_model(kind, coords, values, errors) {
            Ok(fit) => fits.push(fit),
            Err(e) => skipped.push((kind, e.to_string())),
        }
    }

    if fits.is_empty() {
        return Err(FitError::TooFewPoints {
            got: n,
            needed: candidates
                .iter()
                .map(|k| k.param_count() + MIN_N_BUFFER)
                .min()
                .unwrap_or(MIN_N_BUFFER),
        });
    }

    let best = select_by_bic(&fits);
    Ok(ModelSelection {
        best,
        fits,
        skipped,
    })
}

fn select_by_bic(fits: &[ModelFit]) -> ModelFit {
    let mut best = &fits[0];
    for fit in &fits[1..] {
        if fit.bic < best.bic {
            best = fit;
        }
    }
    // Prefer the simplest model within ΔBIC < 2 of the minimum.
    let mut choice = best;
    for fit in fits {
        if fit.model.param_count() < choice.model.param_count() && fit.bic - best.bic < 2.0 {
            choice = fit;
        }
    }
    choice.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::predict;

    fn grid_stars() -> Vec<StellarCoords> {
        let mut stars = Vec::new();
        for i in 0..6 {
            for j in 0..5 {
                stars.push(StellarCoords {
                    temperature: 5400.0 + 150.0 * i as f64,
                    metallicity: -0.6 + 0.25 * j as f64,
                    gravity: 4.2 + 0.05 * ((i + j) % 5) as f64,
                    magnitude: 4.0 + 0.3 * ((2 * i + j) % 7) as f64,
                });
            }
        }
        stars
    }

    #[test]
    fn strong_trend_selects_non_constant_model() {
        let stars = grid_stars();
        let truth = [0.0, 0.05, 40.0, 0.0];
        let values: Vec<f64> = stars.iter().map(|s| predict(ModelKind::Linear, s, &truth)).collect();
        let errors = vec![1.0; stars.len()];
        let sel = select_model(&[ModelKind::Constant, ModelKind::Linear], &stars, &values, &errors).unwrap();
        assert_eq!(sel.best.model, ModelKind::Linear);
    }

    #[test]
    fn flat_data_prefers_the_constant_model() {
        let stars = grid_stars();
        let values = vec![3.0; stars.len()];
        let errors = vec![1.0; stars.len()];
        let sel = select_model(&ModelKind::ALL, &stars, &values, &errors).unwrap();
        assert_eq!(sel.best.model, ModelKind::Constant);
        assert!(sel.skipped.is_empty());
    }

    #[test]
    fn underdetermined_models_are_skipped() {
        let stars: Vec<StellarCoords> = grid_stars().into_iter().take(8).collect();
        let values = vec![1.0; 8];
        let errors = vec![1.0; 8];
        let sel = select_model(&ModelKind::ALL, &stars, &values, &errors).unwrap();
        let skipped: Vec<ModelKind> = sel.skipped.iter().map(|(k, _)| *k).collect();
        assert!(skipped.contains(&ModelKind::Quadratic));
        assert!(!skipped.contains(&ModelKind::Constant));
    }
}
