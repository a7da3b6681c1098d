//! Mainland China resident identity card numbers (GB 11643, 18 digits)

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::datetime::get_age;

static ID_CARD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(1[1-5]|2[1-3]|3[1-7]|4[1-6]|5[0-4]|6[1-5]|71|8[1-3]|91)\d{4}(1[89]|2[0-3])\d{2}(0[1-9]|1[0-2])(0[1-9]|[12][0-9]|3[01])\d{3}[0-9Xx]$",
    )
    .expect("id card pattern is valid")
});

const WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
const CHECK_CODES: [u8; 11] = *b"10X98765432";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdCardInfo {
    pub birthday: NaiveDate,
    pub age: u32,
    pub gender: Gender,
}

fn birthday(id: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(id.get(6..14)?, "%Y%m%d").ok()
}

/// ISO 7064 MOD 11-2 check character for the first 17 digits
fn check_code(id: &[u8]) -> u8 {
    let sum: u32 = id
        .iter()
        .zip(WEIGHTS)
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();
    CHECK_CODES[(sum % 11) as usize]
}

/// Whether `id` is a well-formed 18-digit ID with a real birth date and a
/// matching check character. Lower-case `x` is accepted.
pub fn id_card_verify(id: &str) -> bool {
    if !ID_CARD_PATTERN.is_match(id) || birthday(id).is_none() {
        return false;
    }
    let bytes = id.as_bytes();
    check_code(&bytes[..17]) == bytes[17].to_ascii_uppercase()
}

/// Birthday, current age and gender of a valid ID; `None` when invalid
pub fn get_id_card_info(id: &str) -> Option<IdCardInfo> {
    if !id_card_verify(id) {
        return None;
    }
    let birthday = birthday(id)?;
    let gender = if (id.as_bytes()[16] - b'0') % 2 == 1 {
        Gender::Male
    } else {
        Gender::Female
    };

    Some(IdCardInfo {
        birthday,
        age: get_age(birthday),
        gender,
    })
}
