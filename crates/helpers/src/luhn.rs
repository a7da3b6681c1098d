//! Luhn (mod 10) check digits

use crate::{HelperError, Result};

fn digits(number: &str) -> Result<Vec<u32>> {
    number
        .chars()
        .map(|c| {
            c.to_digit(10)
                .ok_or_else(|| HelperError::InvalidInput(format!("not a digit: {:?}", c)))
        })
        .collect()
}

/// Check digit over `card_no`, where the last position is the slot the
/// check digit goes into.
///
/// Walks positions from the last index down to index 1; digits at even
/// indices are doubled. A doubled value above 10 contributes its digit sum.
pub fn luhn(card_no: &str) -> Result<u8> {
    let digits = digits(card_no)?;

    let sum: u32 = digits
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, &d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 10 {
                    doubled / 10 + doubled % 10
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    Ok(((10 - sum % 10) % 10) as u8)
}

/// Whether `number` (check digit last) passes the standard Luhn test
pub fn luhn_valid(number: &str) -> bool {
    let Ok(digits) = digits(number) else {
        return false;
    };
    if digits.len() < 2 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}
