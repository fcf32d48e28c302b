//! # Validation Module
//!
//! Input validation for counter keys, item fields and batch sizes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web app (TypeScript)                                         │
//! │  └── Batch size field, category dropdown                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Code segments: uppercase alphanumeric                             │
//! │  ├── Batch size: 1..=max                                               │
//! │  └── Serial / year ranges                                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (serial > 0)                                                │
//! │  └── UNIQUE (category_code, year, serial)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use gemtag_core::validation::{validate_code, validate_batch_size};
//!
//! validate_code("category_code", "RNG").unwrap();
//! validate_batch_size(10, 1000).unwrap();
//! ```

use crate::error::ValidationError;
use crate::YEAR_BASE;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest brand, category or location code accepted.
pub const MAX_CODE_LEN: usize = 12;

// =============================================================================
// Code Validators
// =============================================================================

/// Validates a code segment (brand, category code, location code).
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_CODE_LEN`] characters
/// - Uppercase ASCII letters and digits only (`-` is the key separator)
///
/// ## Example
/// ```rust
/// use gemtag_core::validation::validate_code;
///
/// assert!(validate_code("brand", "MG").is_ok());
/// assert!(validate_code("brand", "").is_err());
/// assert!(validate_code("brand", "M-G").is_err());
/// ```
pub fn validate_code(field: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only uppercase letters and digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the number of serials requested for one batch.
///
/// Zero is handled by the allocator as an empty reservation before this runs.
pub fn validate_batch_size(count: u32, max: u32) -> ValidationResult<()> {
    if count == 0 || count > max {
        return Err(ValidationError::OutOfRange {
            field: "count".to_string(),
            min: 1,
            max: max as i64,
        });
    }

    Ok(())
}

/// Validates a serial before it is formatted or stored.
pub fn validate_serial(serial: u32) -> ValidationResult<()> {
    if serial == 0 {
        return Err(ValidationError::MustBePositive {
            field: "serial".to_string(),
        });
    }

    Ok(())
}

/// Validates a four-digit tagging year.
///
/// Only years whose last two digits round-trip through a counter key
/// (`YEAR_BASE..YEAR_BASE + 100`) are accepted.
pub fn validate_year(year: i32) -> ValidationResult<()> {
    if !(YEAR_BASE..YEAR_BASE + 100).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: YEAR_BASE as i64,
            max: (YEAR_BASE + 99) as i64,
        });
    }

    Ok(())
}

/// Validates a barcode serial padding width.
pub fn validate_pad(pad: usize) -> ValidationResult<()> {
    if !(1..=10).contains(&pad) {
        return Err(ValidationError::OutOfRange {
            field: "pad".to_string(),
            min: 1,
            max: 10,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert!(validate_code("brand", "MG").is_ok());
        assert!(validate_code("category_code", "RNG").is_ok());
        assert!(validate_code("location_code", "WH1").is_ok());

        assert!(validate_code("brand", "").is_err());
        assert!(validate_code("brand", "mg").is_err());
        assert!(validate_code("brand", "M G").is_err());
        assert!(validate_code("brand", "M-G").is_err());
        assert!(validate_code("brand", &"A".repeat(20)).is_err());
    }

    #[test]
    fn test_validate_batch_size() {
        assert!(validate_batch_size(1, 1000).is_ok());
        assert!(validate_batch_size(1000, 1000).is_ok());

        assert!(validate_batch_size(0, 1000).is_err());
        assert!(validate_batch_size(1001, 1000).is_err());
    }

    #[test]
    fn test_validate_serial() {
        assert!(validate_serial(1).is_ok());
        assert!(validate_serial(0).is_err());
    }

    #[test]
    fn test_validate_year() {
        assert!(validate_year(2000).is_ok());
        assert!(validate_year(2025).is_ok());
        assert!(validate_year(2099).is_ok());

        assert!(validate_year(1999).is_err());
        assert!(validate_year(2100).is_err());
    }

    #[test]
    fn test_validate_pad() {
        assert!(validate_pad(6).is_ok());
        assert!(validate_pad(0).is_err());
        assert!(validate_pad(11).is_err());
    }
}
