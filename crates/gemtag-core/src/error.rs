//! # Error Types
//!
//! Domain-specific error types for gemtag-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  gemtag-core errors (this file)                                        │
//! │  ├── CoreError        - Key parsing, serial overflow, barcode parsing  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  gemtag-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── AllocError       - What the batch-generation flow sees            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → AllocError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core allocation logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Counter key cannot be split into brand, category and year.
    ///
    /// ## When This Occurs
    /// - Wrong number of `-` separated segments (`"MG-RNG"`)
    /// - Empty segment (`"MG--25"`)
    /// - Year segment is not two digits (`"MG-RNG-2025"`)
    ///
    /// The reservation is refused before the store is touched, so a bad key
    /// can never scan the wrong item population.
    #[error("Invalid counter key '{key}': {reason}")]
    InvalidCounterKey { key: String, reason: String },

    /// Extending the counter would run past the largest representable serial.
    #[error("Serial overflow: counter at {current}, {requested} more requested")]
    SerialOverflow { current: u32, requested: u32 },

    /// A scanned barcode value could not be parsed.
    #[error("Invalid barcode value '{value}': {reason}")]
    InvalidBarcode { value: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidCounterKey error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidCounterKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before allocation runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., lowercase code, stray characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::invalid_key("MG-RNG", "expected 3 segments, found 2");
        assert_eq!(
            err.to_string(),
            "Invalid counter key 'MG-RNG': expected 3 segments, found 2"
        );

        let err = CoreError::SerialOverflow {
            current: u32::MAX - 1,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Serial overflow: counter at 4294967294, 5 more requested"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "brand".to_string(),
        };
        assert_eq!(err.to_string(), "brand is required");

        let err = ValidationError::MustBePositive {
            field: "serial".to_string(),
        };
        assert_eq!(err.to_string(), "serial must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "category_code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
