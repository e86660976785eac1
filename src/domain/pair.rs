//! Pairs of transitions measured against each other.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;
use crate::domain::element::{Element, roman_numeral};
use crate::domain::transition::Transition;
use crate::spectral::doppler::wavelength_to_velocity;
use crate::units::{Velocity, VelocityExt};

/// Two distinct transitions. The member with the longer wavelength is the
/// lower-energy transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PairRecord", into = "PairRecord")]
pub struct TransitionPair {
    higher: Transition,
    lower: Transition,
    /// HARPS orders (0-based) in which both members are measured.
    pub orders_to_measure_in: Vec<usize>,
}

impl TransitionPair {
    pub fn new(a: Transition, b: Transition) -> Result<Self, DomainError> {
        match a.cmp(&b) {
            Ordering::Equal => Err(DomainError::SameWavelengths(a.label())),
            Ordering::Less => Ok(Self {
                higher: a,
                lower: b,
                orders_to_measure_in: Vec::new(),
            }),
            Ordering::Greater => Ok(Self {
                higher: b,
                lower: a,
                orders_to_measure_in: Vec::new(),
            }),
        }
    }

    pub fn higher_energy(&self) -> &Transition {
        &self.higher
    }

    pub fn lower_energy(&self) -> &Transition {
        &self.lower
    }

    /// Velocity separation between the members (positive by construction).
    pub fn velocity_separation(&self) -> Velocity {
        Velocity::from_meters_per_second(wavelength_to_velocity(
            self.higher.wavelength_aa(),
            self.lower.wavelength_aa(),
        ))
    }

    pub fn label(&self) -> String {
        format!("{}_{}", self.higher.label(), self.lower.label())
    }

    pub fn order_label(&self, order: usize) -> String {
        format!("{}_{order}", self.label())
    }

    /// Sorted blend grades of both members.
    pub fn blend_tuple(&self) -> Result<(u8, u8), DomainError> {
        match (self.higher.blendedness, self.lower.blendedness) {
            (Some(a), Some(b)) => Ok((a.min(b), a.max(b))),
            _ => Err(DomainError::UnknownBlendedness(self.label())),
        }
    }

    /// Iterate over the members, higher-energy transition first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        [&self.higher, &self.lower].into_iter()
    }
}

impl PartialEq for TransitionPair {
    fn eq(&self, other: &Self) -> bool {
        self.higher == other.higher && self.lower == other.lower
    }
}

impl Eq for TransitionPair {}

impl PartialOrd for TransitionPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransitionPair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.higher
            .cmp(&other.higher)
            .then_with(|| self.lower.cmp(&other.lower))
    }
}

impl std::fmt::Display for TransitionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pair: {}, {}", self.higher, self.lower)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PairRecord {
    higher: Transition,
    lower: Transition,
    #[serde(default)]
    orders_to_measure_in: Vec<usize>,
}

impl TryFrom<PairRecord> for TransitionPair {
    type Error = DomainError;

    fn try_from(r: PairRecord) -> Result<Self, Self::Error> {
        let mut pair = TransitionPair::new(r.higher, r.lower)?;
        pair.orders_to_measure_in = r.orders_to_measure_in;
        Ok(pair)
    }
}

impl From<TransitionPair> for PairRecord {
    fn from(p: TransitionPair) -> Self {
        PairRecord {
            higher: p.higher,
            lower: p.lower,
            orders_to_measure_in: p.orders_to_measure_in,
        }
    }
}

/// One member of a parsed pair label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPart {
    pub wavelength_aa: f64,
    pub element: Element,
    pub ionization: u8,
}

impl LabelPart {
    fn parse(text: &str) -> Result<Self, DomainError> {
        let bad = || DomainError::BadLabel(text.to_string());
        let split = text
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(bad)?;
        let (number, rest) = text.split_at(split);
        let digits = rest
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(bad)?;
        let (symbol, ion) = rest.split_at(digits);
        Ok(Self {
            wavelength_aa: number.parse().map_err(|_| bad())?,
            element: Element::from_symbol(symbol).map_err(|_| bad())?,
            ionization: ion.parse().map_err(|_| bad())?,
        })
    }
}

/// Split a pair label (`6138.313Fe1_6139.390Fe1`, optionally with a trailing
/// `_<order>`) into its members and order.
pub fn parse_pair_label(label: &str) -> Result<(LabelPart, LabelPart, Option<usize>), DomainError> {
    let parts: Vec<&str> = label.split('_').collect();
    let order = match parts.len() {
        2 => None,
        3 => Some(
            parts[2]
                .parse()
                .map_err(|_| DomainError::BadLabel(label.to_string()))?,
        ),
        _ => return Err(DomainError::BadLabel(label.to_string())),
    };
    Ok((LabelPart::parse(parts[0])?, LabelPart::parse(parts[1])?, order))
}

/// Human-readable form of a pair label: `Fe I 6138.313, Fe I 6139.390`.
pub fn format_pair_label(label: &str) -> Result<String, DomainError> {
    let (a, b, _) = parse_pair_label(label)?;
    let fmt = |p: &LabelPart| -> Result<String, DomainError> {
        Ok(format!(
            "{} {} {:.3}",
            p.element,
            roman_numeral(p.ionization)?,
            p.wavelength_aa
        ))
    };
    Ok(format!("{}, {}", fmt(&a)?, fmt(&b)?))
}
