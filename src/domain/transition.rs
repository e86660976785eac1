//! A single atomic transition (absorption line).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::element::{Element, roman_numeral};
use crate::domain::DomainError;
use crate::units::{Length, LengthExt};

/// An atomic transition identified by its vacuum wavelength, element and
/// ionization state. Level information is optional.
///
/// Transitions compare and sort by wavelength only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TransitionRecord", into = "TransitionRecord")]
pub struct Transition {
    wavelength: Length,
    pub element: Element,
    pub ionization: u8,
    /// Lower level energy (cm^-1).
    pub lower_energy: Option<f64>,
    pub lower_j: Option<f64>,
    pub lower_orbital: Option<String>,
    /// Upper level energy (cm^-1).
    pub higher_energy: Option<f64>,
    pub higher_j: Option<f64>,
    pub higher_orbital: Option<String>,
    /// Blend grade from inspection of the solar spectrum (0 = unblended).
    pub blendedness: Option<u8>,
    /// Depth in the normalized solar spectrum (0 = no absorption).
    pub normalized_depth: Option<f64>,
    /// HARPS orders (0-based) the line is fitted in.
    pub orders_to_fit_in: Vec<usize>,
}

impl Transition {
    pub fn new(wavelength: Length, element: Element, ionization: u8) -> Result<Self, DomainError> {
        let aa = wavelength.as_angstroms();
        if !(aa.is_finite() && aa > 0.0) {
            return Err(DomainError::InvalidWavelength(aa));
        }
        if ionization == 0 {
            return Err(DomainError::InvalidIonization(ionization.to_string()));
        }
        Ok(Self {
            wavelength,
            element,
            ionization,
            lower_energy: None,
            lower_j: None,
            lower_orbital: None,
            higher_energy: None,
            higher_j: None,
            higher_orbital: None,
            blendedness: None,
            normalized_depth: None,
            orders_to_fit_in: Vec::new(),
        })
    }

    /// Convenience constructor taking textual element/ionization forms.
    pub fn parse(wavelength_aa: f64, element: &str, ionization: &str) -> Result<Self, DomainError> {
        Self::new(
            Length::from_angstroms(wavelength_aa),
            Element::parse(element)?,
            crate::domain::element::parse_ionization(ionization)?,
        )
    }

    pub fn wavelength(&self) -> Length {
        self.wavelength
    }

    pub fn wavelength_aa(&self) -> f64 {
        self.wavelength.as_angstroms()
    }

    /// Wavenumber in cm^-1.
    pub fn wavenumber(&self) -> f64 {
        1.0 / self.wavelength.as_centimeters()
    }

    pub fn set_wavenumber(&mut self, wavenumber: f64) -> Result<(), DomainError> {
        if !(wavenumber.is_finite() && wavenumber > 0.0) {
            return Err(DomainError::InvalidWavelength(wavenumber));
        }
        self.wavelength = Length::from_angstroms(1e8 / wavenumber);
        Ok(())
    }

    /// Species in spectroscopic notation, e.g. `Fe II`.
    pub fn atomic_species(&self) -> String {
        match roman_numeral(self.ionization) {
            Ok(numeral) => format!("{} {numeral}", self.element),
            Err(_) => format!("{} {}", self.element, self.ionization),
        }
    }

    /// Short label such as `4217.791Fe1`.
    pub fn label(&self) -> String {
        format!("{:.3}{}{}", self.wavelength_aa(), self.element, self.ionization)
    }

    /// Label for the transition as measured in a given order, e.g. `4217.791Fe1_16`.
    pub fn order_label(&self, order: usize) -> String {
        format!("{}_{order}", self.label())
    }
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.wavelength_aa() == other.wavelength_aa()
    }
}

impl Eq for Transition {}

impl PartialOrd for Transition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Transition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wavelength_aa().total_cmp(&other.wavelength_aa())
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.4} nm {}",
            self.wavelength.as_nanometers(),
            self.atomic_species()
        )?;
        if let (Some(low), Some(high)) = (self.lower_energy, self.higher_energy) {
            write!(f, " ({low:.3}, {high:.3})")?;
        }
        Ok(())
    }
}

/// Serialized shape of a transition (wavelength as plain Angstroms).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransitionRecord {
    wavelength_aa: f64,
    element: Element,
    ionization: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lower_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lower_j: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lower_orbital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    higher_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    higher_j: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    higher_orbital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blendedness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    normalized_depth: Option<f64>,
    #[serde(default)]
    orders_to_fit_in: Vec<usize>,
}

impl TryFrom<TransitionRecord> for Transition {
    type Error = DomainError;

    fn try_from(r: TransitionRecord) -> Result<Self, Self::Error> {
        let mut t = Transition::new(Length::from_angstroms(r.wavelength_aa), r.element, r.ionization)?;
        t.lower_energy = r.lower_energy;
        t.lower_j = r.lower_j;
        t.lower_orbital = r.lower_orbital;
        t.higher_energy = r.higher_energy;
        t.higher_j = r.higher_j;
        t.higher_orbital = r.higher_orbital;
        t.blendedness = r.blendedness;
        t.normalized_depth = r.normalized_depth;
        t.orders_to_fit_in = r.orders_to_fit_in;
        Ok(t)
    }
}

impl From<Transition> for TransitionRecord {
    fn from(t: Transition) -> Self {
        TransitionRecord {
            wavelength_aa: t.wavelength_aa(),
            element: t.element,
            ionization: t.ionization,
            lower_energy: t.lower_energy,
            lower_j: t.lower_j,
            lower_orbital: t.lower_orbital,
            higher_energy: t.higher_energy,
            higher_j: t.higher_j,
            higher_orbital: t.higher_orbital,
            blendedness: t.blendedness,
            normalized_depth: t.normalized_depth,
            orders_to_fit_in: t.orders_to_fit_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fe1(wl: f64) -> Transition {
        Transition::parse(wl, "Fe", "1").unwrap()
    }

    #[test]
    fn labels_use_three_decimals() {
        let t = fe1(4217.791);
        assert_eq!(t.label(), "4217.791Fe1");
        assert_eq!(t.order_label(16), "4217.791Fe1_16");
        assert_eq!(t.atomic_species(), "Fe I");
    }

    #[test]
    fn wavenumber_round_trips() {
        let mut t = fe1(5000.0);
        assert_relative_eq!(t.wavenumber(), 20_000.0, epsilon = 1e-8);
        t.set_wavenumber(25_000.0).unwrap();
        assert_relative_eq!(t.wavelength_aa(), 4000.0, epsilon = 1e-9);
        assert!(t.set_wavenumber(0.0).is_err());
    }

    #[test]
    fn rejects_invalid_wavelength_and_ionization() {
        assert!(Transition::parse(-1.0, "Fe", "1").is_err());
        assert!(Transition::parse(f64::NAN, "Fe", "1").is_err());
        assert!(Transition::parse(5000.0, "Fe", "0").is_err());
    }

    #[test]
    fn ordering_is_by_wavelength() {
        let mut lines = vec![fe1(6000.0), Transition::parse(5000.0, "Cr", "II").unwrap(), fe1(5500.0)];
        lines.sort();
        let wls: Vec<f64> = lines.iter().map(Transition::wavelength_aa).collect();
        assert_eq!(wls, vec![5000.0, 5500.0, 6000.0]);
        assert_eq!(fe1(5000.0), Transition::parse(5000.0, "Cr", "2").unwrap());
    }

    #[test]
    fn display_includes_energies_when_known() {
        let mut t = fe1(5000.0);
        assert_eq!(t.to_string(), "500.0000 nm Fe I");
        t.lower_energy = Some(100.0);
        t.higher_energy = Some(20100.0);
        assert_eq!(t.to_string(), "500.0000 nm Fe I (100.000, 20100.000)");
    }

    #[test]
    fn json_round_trip_keeps_fields() {
        let mut t = fe1(6138.313);
        t.blendedness = Some(1);
        t.orders_to_fit_in = vec![60];
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"element\":\"Fe\""));
        let back: Transition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.label(), t.label());
        assert_eq!(back.blendedness, Some(1));
        assert_eq!(back.orders_to_fit_in, vec![60]);
    }
}
