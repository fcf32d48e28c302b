//! # Counter Keys
//!
//! A counter key names one serial stream: `{BRAND}-{CATEGORY_CODE}-{YY}`.
//!
//! ```text
//!   MG - RNG - 25
//!   │     │     └── two-digit year → scans items tagged in 2025
//!   │     └──────── category code  → scans items with category_code = RNG
//!   └────────────── brand          → part of the counter identity only
//! ```
//!
//! The category and year segments decide which tagged items are scanned for
//! gaps, so a key that does not split cleanly is rejected outright.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::validation::{validate_code, validate_year};
use crate::YEAR_BASE;

/// Parsed `{BRAND}-{CATEGORY_CODE}-{YY}` counter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    brand: String,
    category_code: String,
    yy: u8,
}

impl CounterKey {
    /// Builds a key from its parts and a four-digit year.
    ///
    /// ## Example
    /// ```rust
    /// use gemtag_core::CounterKey;
    ///
    /// let key = CounterKey::new("MG", "RNG", 2025).unwrap();
    /// assert_eq!(key.to_string(), "MG-RNG-25");
    /// ```
    pub fn new(brand: &str, category_code: &str, year: i32) -> CoreResult<Self> {
        validate_code("brand", brand)?;
        validate_code("category_code", category_code)?;
        validate_year(year)?;

        Ok(CounterKey {
            brand: brand.to_string(),
            category_code: category_code.to_string(),
            yy: (year - YEAR_BASE) as u8,
        })
    }

    /// Brand segment.
    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Category code segment; matches `TaggedItem::category_code`.
    pub fn category_code(&self) -> &str {
        &self.category_code
    }

    /// Two-digit year segment.
    pub fn yy(&self) -> u8 {
        self.yy
    }

    /// Four-digit year reconstructed as `2000 + YY`.
    pub fn year(&self) -> i32 {
        YEAR_BASE + self.yy as i32
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:02}", self.brand, self.category_code, self.yy)
    }
}

impl FromStr for CounterKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('-').collect();
        if segments.len() != 3 {
            return Err(CoreError::invalid_key(
                s,
                format!("expected 3 segments, found {}", segments.len()),
            ));
        }

        let (brand, category_code, yy) = (segments[0], segments[1], segments[2]);

        validate_code("brand", brand).map_err(|e| CoreError::invalid_key(s, e.to_string()))?;
        validate_code("category_code", category_code)
            .map_err(|e| CoreError::invalid_key(s, e.to_string()))?;

        if yy.len() != 2 || !yy.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::invalid_key(s, "year segment must be two digits"));
        }
        let yy: u8 = yy
            .parse()
            .map_err(|_| CoreError::invalid_key(s, "year segment must be two digits"))?;

        Ok(CounterKey {
            brand: brand.to_string(),
            category_code: category_code.to_string(),
            yy,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counter_key() {
        let key: CounterKey = "MG-RNG-25".parse().unwrap();
        assert_eq!(key.brand(), "MG");
        assert_eq!(key.category_code(), "RNG");
        assert_eq!(key.yy(), 25);
        assert_eq!(key.year(), 2025);
    }

    #[test]
    fn test_display_round_trips_leading_zero() {
        let key: CounterKey = "MG-NCK-07".parse().unwrap();
        assert_eq!(key.year(), 2007);
        assert_eq!(key.to_string(), "MG-NCK-07");
    }

    #[test]
    fn test_new_from_four_digit_year() {
        let key = CounterKey::new("MG", "BRC", 2031).unwrap();
        assert_eq!(key.to_string(), "MG-BRC-31");
        assert!(CounterKey::new("MG", "BRC", 1999).is_err());
        assert!(CounterKey::new("", "BRC", 2025).is_err());
    }

    #[test]
    fn test_malformed_keys_fail_fast() {
        for bad in [
            "",
            "MG",
            "MG-RNG",
            "MG-RNG-25-X",
            "MG--25",
            "-RNG-25",
            "MG-RNG-",
            "MG-RNG-2025",
            "MG-RNG-5",
            "MG-RNG-AB",
            "mg-rng-25",
        ] {
            let err = bad.parse::<CounterKey>().unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidCounterKey { .. }),
                "expected InvalidCounterKey for {bad:?}, got {err:?}"
            );
        }
    }
}
