//! GTIN / EAN-13 barcode validation.
//!
//! Non-digit characters are ignored, so `"400-6381-33393-1"` and
//! `"4006381333931"` validate identically.

use thiserror::Error;

/// Number of digits in an EAN-13 code.
pub const EAN13_LEN: usize = 13;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GtinError {
    #[error("GTIN/EAN-13 must have 13 digits (found {found})")]
    Length { found: usize },

    #[error("GTIN/EAN-13 check digit is invalid (expected {expected}, found {found})")]
    CheckDigit { expected: u8, found: u8 },
}

/// Check digit for the first 12 digits of an EAN-13 code.
///
/// Digits at even positions weigh 1, odd positions weigh 3.
pub fn check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d as u32 } else { *d as u32 * 3 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Validates an EAN-13 code and returns its 13 digits.
pub fn validate_ean13(value: &str) -> Result<[u8; EAN13_LEN], GtinError> {
    let digits: Vec<u8> = value
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as u8)
        .collect();

    let digits: [u8; EAN13_LEN] = digits
        .as_slice()
        .try_into()
        .map_err(|_| GtinError::Length {
            found: digits.len(),
        })?;

    let expected = check_digit(&digits[..EAN13_LEN - 1]);
    let found = digits[EAN13_LEN - 1];
    if expected != found {
        return Err(GtinError::CheckDigit { expected, found });
    }

    Ok(digits)
}

/// Convenience predicate over [`validate_ean13`].
pub fn is_valid_ean13(value: &str) -> bool {
    validate_ean13(value).is_ok()
}
