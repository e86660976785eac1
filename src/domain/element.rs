//! Periodic-table and ionization-state lookups.

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

const SYMBOLS: [&str; 92] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U",
];

const ROMAN: [&str; 10] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X"];

/// A chemical element identified by its atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Element(u8);

impl Element {
    pub fn from_atomic_number(z: u8) -> Result<Self, DomainError> {
        if (1..=SYMBOLS.len() as u8).contains(&z) {
            Ok(Self(z))
        } else {
            Err(DomainError::UnknownElement(z.to_string()))
        }
    }

    pub fn from_symbol(symbol: &str) -> Result<Self, DomainError> {
        let normalized = capitalize(symbol.trim());
        SYMBOLS
            .iter()
            .position(|s| *s == normalized)
            .map(|idx| Self(idx as u8 + 1))
            .ok_or_else(|| DomainError::UnknownElement(symbol.to_string()))
    }

    /// Parse either an atomic number ("26") or a symbol in any case ("fe").
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let text = text.trim();
        match text.parse::<u8>() {
            Ok(z) => Self::from_atomic_number(z),
            Err(_) if text.chars().all(|c| c.is_ascii_digit()) && !text.is_empty() => {
                Err(DomainError::UnknownElement(text.to_string()))
            }
            Err(_) => Self::from_symbol(text),
        }
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[self.0 as usize - 1]
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl TryFrom<String> for Element {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Element::parse(&value)
    }
}

impl From<Element> for String {
    fn from(value: Element) -> Self {
        value.symbol().to_string()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Roman numeral for an ionization state (1 -> "I").
pub fn roman_numeral(ionization: u8) -> Result<&'static str, DomainError> {
    ROMAN
        .get((ionization as usize).wrapping_sub(1))
        .copied()
        .ok_or_else(|| DomainError::InvalidIonization(ionization.to_string()))
}

/// Parse an ionization state given as an integer or a Roman numeral.
pub fn parse_ionization(text: &str) -> Result<u8, DomainError> {
    let text = text.trim();
    if let Ok(value) = text.parse::<u8>() {
        return if value >= 1 {
            Ok(value)
        } else {
            Err(DomainError::InvalidIonization(text.to_string()))
        };
    }
    let upper = text.to_ascii_uppercase();
    ROMAN
        .iter()
        .position(|r| *r == upper)
        .map(|idx| idx as u8 + 1)
        .ok_or_else(|| DomainError::InvalidIonization(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_and_numbers_are_bijective() {
        for z in 1..=92u8 {
            let element = Element::from_atomic_number(z).unwrap();
            assert_eq!(Element::from_symbol(element.symbol()).unwrap(), element);
        }
        assert_eq!(Element::parse("26").unwrap().symbol(), "Fe");
        assert_eq!(Element::parse("fe").unwrap().atomic_number(), 26);
        assert_eq!(Element::parse("CR").unwrap().atomic_number(), 24);
    }

    #[test]
    fn unknown_elements_are_rejected() {
        assert!(Element::parse("Xx").is_err());
        assert!(Element::parse("0").is_err());
        assert!(Element::parse("93").is_err());
        assert!(Element::parse("300").is_err());
        assert!(Element::parse("").is_err());
    }

    #[test]
    fn ionization_accepts_roman_and_integer() {
        assert_eq!(parse_ionization("1").unwrap(), 1);
        assert_eq!(parse_ionization("II").unwrap(), 2);
        assert_eq!(parse_ionization("iv").unwrap(), 4);
        assert!(parse_ionization("0").is_err());
        assert!(parse_ionization("XI").is_err());
        assert_eq!(roman_numeral(3).unwrap(), "III");
        assert!(roman_numeral(0).is_err());
    }
}
