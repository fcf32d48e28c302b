//! # Barcode Values
//!
//! The string encoded on a printed tag:
//!
//! ```text
//!   MG-RNG-WH1-25-000042
//!   │   │   │   │    └── serial, zero-padded (default 6 digits)
//!   │   │   │   └─────── last two digits of the tagging year
//!   │   │   └─────────── location code
//!   │   └─────────────── category code
//!   └─────────────────── brand
//! ```
//!
//! Rendering the value as bars is the label printer's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::validation::{validate_code, validate_pad, validate_serial, validate_year};
use crate::{DEFAULT_BARCODE_PAD, YEAR_BASE};

/// Formats a barcode value.
///
/// ## Example
/// ```rust
/// use gemtag_core::barcode::format_barcode_value;
///
/// let value = format_barcode_value("MG", "RNG", "WH1", 2025, 42, 6).unwrap();
/// assert_eq!(value, "MG-RNG-WH1-25-000042");
/// ```
pub fn format_barcode_value(
    brand: &str,
    category_code: &str,
    location_code: &str,
    year: i32,
    serial: u32,
    pad: usize,
) -> CoreResult<String> {
    Ok(BarcodeValue::new(brand, category_code, location_code, year, serial)?
        .with_pad(pad)?
        .to_string())
}

/// A barcode value split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BarcodeValue {
    pub brand: String,
    pub category_code: String,
    pub location_code: String,
    /// Four-digit year.
    pub year: i32,
    pub serial: u32,
    /// Minimum width of the serial segment.
    #[ts(type = "number")]
    pub pad: usize,
}

impl BarcodeValue {
    /// Creates a barcode value with the default padding.
    pub fn new(
        brand: &str,
        category_code: &str,
        location_code: &str,
        year: i32,
        serial: u32,
    ) -> CoreResult<Self> {
        validate_code("brand", brand)?;
        validate_code("category_code", category_code)?;
        validate_code("location_code", location_code)?;
        validate_year(year)?;
        validate_serial(serial)?;

        Ok(BarcodeValue {
            brand: brand.to_string(),
            category_code: category_code.to_string(),
            location_code: location_code.to_string(),
            year,
            serial,
            pad: DEFAULT_BARCODE_PAD,
        })
    }

    /// Overrides the serial padding width.
    pub fn with_pad(mut self, pad: usize) -> CoreResult<Self> {
        validate_pad(pad)?;
        self.pad = pad;
        Ok(self)
    }

    /// Counter key this value was allocated from.
    pub fn counter_key(&self) -> String {
        format!(
            "{}-{}-{:02}",
            self.brand,
            self.category_code,
            self.year - YEAR_BASE
        )
    }
}

impl fmt::Display for BarcodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{:02}-{:0pad$}",
            self.brand,
            self.category_code,
            self.location_code,
            self.year - YEAR_BASE,
            self.serial,
            pad = self.pad
        )
    }
}

impl FromStr for BarcodeValue {
    type Err = CoreError;

    /// Parses a scanned value. The padding is taken from the serial segment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidBarcode {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = s.trim().split('-').collect();
        if segments.len() != 5 {
            return Err(invalid("expected 5 segments"));
        }

        let yy = segments[3];
        if yy.len() != 2 || !yy.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("year segment must be two digits"));
        }
        let yy: i32 = yy
            .parse()
            .map_err(|_| invalid("year segment must be two digits"))?;

        let serial_str = segments[4];
        if serial_str.is_empty() || !serial_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("serial segment must be numeric"));
        }
        let serial: u32 = serial_str
            .parse()
            .map_err(|_| invalid("serial segment out of range"))?;

        BarcodeValue::new(
            segments[0],
            segments[1],
            segments[2],
            YEAR_BASE + yy,
            serial,
        )?
        .with_pad(serial_str.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_serial() {
        assert_eq!(
            format_barcode_value("MG", "RNG", "WH1", 2025, 7, 6).unwrap(),
            "MG-RNG-WH1-25-000007"
        );
        assert_eq!(
            format_barcode_value("MG", "RNG", "WH1", 2025, 7, 3).unwrap(),
            "MG-RNG-WH1-25-007"
        );
    }

    #[test]
    fn test_serial_wider_than_pad_is_not_truncated() {
        assert_eq!(
            format_barcode_value("MG", "RNG", "WH1", 2025, 1234567, 6).unwrap(),
            "MG-RNG-WH1-25-1234567"
        );
    }

    #[test]
    fn test_rejects_zero_serial() {
        let err = format_barcode_value("MG", "RNG", "WH1", 2025, 0, 6).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_parse_scanned_value() {
        let value: BarcodeValue = "MG-NCK-SHOP2-26-000120".parse().unwrap();
        assert_eq!(value.brand, "MG");
        assert_eq!(value.category_code, "NCK");
        assert_eq!(value.location_code, "SHOP2");
        assert_eq!(value.year, 2026);
        assert_eq!(value.serial, 120);
        assert_eq!(value.pad, 6);
        assert_eq!(value.counter_key(), "MG-NCK-26");
        assert_eq!(value.to_string(), "MG-NCK-SHOP2-26-000120");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("MG-RNG-25-000001".parse::<BarcodeValue>().is_err());
        assert!("MG-RNG-WH1-2025-000001".parse::<BarcodeValue>().is_err());
        assert!("MG-RNG-WH1-25-00A001".parse::<BarcodeValue>().is_err());
        assert!("MG-RNG-WH1-25-000000".parse::<BarcodeValue>().is_err());
    }
}
