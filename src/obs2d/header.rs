//! FITS header cards keyed by normalized name.
//!
//! ESO writes its instrument keywords with the `HIERARCH` convention
//! (`HIERARCH ESO DRS BERV`). Keys are stored without that prefix so lookups
//! work with either spelling.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::obs2d::SpectrumError;

/// Value of a single header card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CardValue {
    fn type_name(&self) -> &'static str {
        match self {
            CardValue::Bool(_) => "bool",
            CardValue::Int(_) => "int",
            CardValue::Float(_) => "float",
            CardValue::Text(_) => "string",
        }
    }
}

impl std::fmt::Display for CardValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardValue::Bool(v) => write!(f, "{}", if *v { "T" } else { "F" }),
            CardValue::Int(v) => write!(f, "{v}"),
            CardValue::Float(v) => write!(f, "{v}"),
            CardValue::Text(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    cards: BTreeMap<String, CardValue>,
}

pub fn normalize_key(key: &str) -> String {
    let key = key.trim();
    key.strip_prefix("HIERARCH ").unwrap_or(key).trim().to_string()
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: CardValue) {
        self.cards.insert(normalize_key(key), value);
    }

    pub fn with(mut self, key: &str, value: CardValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&CardValue> {
        self.cards.get(&normalize_key(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn card(&self, key: &str) -> Result<&CardValue, SpectrumError> {
        self.get(key)
            .ok_or_else(|| SpectrumError::MissingCard(normalize_key(key)))
    }

    /// Numeric card as `f64` (integers are promoted).
    pub fn float(&self, key: &str) -> Result<f64, SpectrumError> {
        match self.card(key)? {
            CardValue::Float(v) => Ok(*v),
            CardValue::Int(v) => Ok(*v as f64),
            other => Err(wrong_type(key, "float", other)),
        }
    }

    /// Card that must be stored as a float.
    pub fn strict_float(&self, key: &str) -> Result<f64, SpectrumError> {
        match self.card(key)? {
            CardValue::Float(v) => Ok(*v),
            other => Err(wrong_type(key, "float", other)),
        }
    }

    pub fn int(&self, key: &str) -> Result<i64, SpectrumError> {
        match self.card(key)? {
            CardValue::Int(v) => Ok(*v),
            other => Err(wrong_type(key, "int", other)),
        }
    }

    pub fn text(&self, key: &str) -> Result<&str, SpectrumError> {
        match self.card(key)? {
            CardValue::Text(v) => Ok(v.trim()),
            other => Err(wrong_type(key, "string", other)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CardValue)> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &CardValue) -> SpectrumError {
    SpectrumError::WrongCardType {
        key: normalize_key(key),
        expected,
        found: found.type_name(),
    }
}
