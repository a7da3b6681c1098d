//! Byte packing in the signed-byte convention used by Java peers

use crate::{HelperError, Result};

/// UTF-8 bytes of `s` as signed values (`0x80..=0xFF` become negative)
pub fn str_to_bytes(s: &str) -> Vec<i8> {
    s.bytes().map(|b| b as i8).collect()
}

pub fn bytes_to_string(bytes: &[i8]) -> Result<String> {
    let raw: Vec<u8> = bytes.iter().map(|&b| b as u8).collect();
    String::from_utf8(raw).map_err(|e| HelperError::Encoding(e.to_string()))
}

/// Little-endian
pub fn integer_to_bytes(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Little-endian `i32` starting at `position`
pub fn bytes_to_integer(bytes: &[u8], position: usize) -> Result<i32> {
    let chunk = window::<4>(bytes, position)?;
    Ok(i32::from_le_bytes(chunk))
}

pub fn short_to_bytes(value: i16) -> [u8; 2] {
    value.to_le_bytes()
}

pub fn bytes_to_short(bytes: &[u8], position: usize) -> Result<i16> {
    let chunk = window::<2>(bytes, position)?;
    Ok(i16::from_le_bytes(chunk))
}

fn window<const N: usize>(bytes: &[u8], position: usize) -> Result<[u8; N]> {
    position
        .checked_add(N)
        .and_then(|end| bytes.get(position..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            HelperError::OutOfRange(format!(
                "need {} bytes at position {}, have {}",
                N,
                position,
                bytes.len()
            ))
        })
}
