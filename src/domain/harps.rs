//! HARPS instrument constants and echelle order numbering.

use chrono::NaiveDate;

use crate::domain::DomainError;

/// Number of extracted orders in an e2ds frame.
pub const N_ORDERS: usize = 72;

/// Pixels per extracted order.
pub const N_PIXELS: usize = 4096;

/// Dark current plus read noise, in electrons.
pub const READ_NOISE: f64 = 12.0;

/// Error assigned to pixels whose flux is negative.
pub const NEGATIVE_FLUX_ERROR: f64 = 1e5;

/// First echelle order number (ordinal order 1).
const FIRST_ECHELLE_ORDER: u32 = 161;

/// Echelle order that falls in the gap between the two CCDs.
const MISSING_ECHELLE_ORDER: u32 = 115;

/// Date the secondary mirror was replaced.
pub fn secondary_mirror_change() -> NaiveDate {
    NaiveDate::from_ymd_opt(2004, 8, 8).unwrap_or_default()
}

/// Date the flat-field lamp was changed.
pub fn flat_field_lamp_change() -> NaiveDate {
    NaiveDate::from_ymd_opt(2008, 8, 22).unwrap_or_default()
}

/// Date the fibres were replaced; splits observations into two eras.
pub fn fiber_change() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 6, 1).unwrap_or_default()
}

/// Echelle order number for an ordinal order in `1..=72`.
pub fn echelle_order(ordinal: usize) -> Result<u32, DomainError> {
    if !(1..=N_ORDERS).contains(&ordinal) {
        return Err(DomainError::UnknownOrder(ordinal.to_string()));
    }
    let mut echelle = FIRST_ECHELLE_ORDER - (ordinal as u32 - 1);
    if echelle <= MISSING_ECHELLE_ORDER {
        echelle -= 1;
    }
    Ok(echelle)
}

/// Ordinal order (`1..=72`) for an echelle order number.
pub fn ordinal_order(echelle: u32) -> Result<usize, DomainError> {
    let lowest = FIRST_ECHELLE_ORDER - N_ORDERS as u32;
    if echelle == MISSING_ECHELLE_ORDER || !(lowest..=FIRST_ECHELLE_ORDER).contains(&echelle) {
        return Err(DomainError::UnknownOrder(echelle.to_string()));
    }
    let mut ordinal = (FIRST_ECHELLE_ORDER - echelle) as usize + 1;
    if echelle < MISSING_ECHELLE_ORDER {
        ordinal -= 1;
    }
    Ok(ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_map_skips_missing_echelle_order() {
        assert_eq!(echelle_order(1).unwrap(), 161);
        assert_eq!(echelle_order(46).unwrap(), 116);
        assert_eq!(echelle_order(47).unwrap(), 114);
        assert_eq!(echelle_order(72).unwrap(), 89);
        assert!(echelle_order(0).is_err());
        assert!(echelle_order(73).is_err());
    }

    #[test]
    fn order_map_round_trips() {
        for ordinal in 1..=N_ORDERS {
            let echelle = echelle_order(ordinal).unwrap();
            assert_eq!(ordinal_order(echelle).unwrap(), ordinal);
        }
        assert!(ordinal_order(115).is_err());
        assert!(ordinal_order(88).is_err());
        assert!(ordinal_order(162).is_err());
    }
}
