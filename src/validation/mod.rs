//! Field validators shared by request payloads and services.

pub mod gtin;

use validator::ValidationError;

pub use gtin::{is_valid_ean13, validate_ean13, GtinError};

/// `validator` adapter for GTIN fields.
pub fn validate_gtin(value: &str) -> Result<(), ValidationError> {
    validate_ean13(value).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("gtin");
        err.message = Some(e.to_string().into());
        err
    })
}

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}
