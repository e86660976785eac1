//! Fitted model coefficients for every transition column and era.
//!
//! Written by `fit-model` and read back to correct offsets. Entries are keyed
//! `<label>_<era>`, e.g. `4217.791Fe1_16_pre`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Era, ModelKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: ModelKind,
    pub coefficients: BTreeMap<String, Vec<f64>>,
    pub sigma_sys: BTreeMap<String, f64>,
}

impl ModelParams {
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            coefficients: BTreeMap::new(),
            sigma_sys: BTreeMap::new(),
        }
    }

    pub fn key(label: &str, era: Era) -> String {
        format!("{label}_{era}")
    }

    pub fn insert(&mut self, label: &str, era: Era, betas: Vec<f64>, sigma_sys: f64) {
        let key = Self::key(label, era);
        self.coefficients.insert(key.clone(), betas);
        self.sigma_sys.insert(key, sigma_sys);
    }

    /// Coefficients for a column, if they exist and match the model's size.
    pub fn coefficients_for(&self, label: &str, era: Era) -> Option<&[f64]> {
        self.coefficients
            .get(&Self::key(label, era))
            .map(Vec::as_slice)
            .filter(|b| b.len() == self.model.param_count())
    }

    pub fn sigma_sys_for(&self, label: &str, era: Era) -> Option<f64> {
        self.sigma_sys.get(&Self::key(label, era)).copied()
    }
}
