//! # Domain Types
//!
//! Core domain types used throughout Gemtag.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Counter      │   │   TaggedItem    │   │  Reservation    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  key MG-RNG-25  │   │  id (UUID)      │   │  batch_id       │       │
//! │  │  value          │   │  category_code  │   │  start / end    │       │
//! │  │  version        │   │  year, serial   │   │  serials[]      │       │
//! │  │  updated_at     │   │  barcode        │   │  expires_at     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │  NewTaggedItem  │   │  CounterStatus  │                             │
//! │  │  (before save)  │   │  (diagnostics)  │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::barcode::BarcodeValue;
use crate::error::CoreResult;
use crate::key::CounterKey;

// =============================================================================
// Counter
// =============================================================================

/// Persistent per-key counter.
///
/// `value` is the highest serial ever issued by extension. It never moves
/// backwards, even when items are deleted or a batch is never saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Counter {
    /// Counter key, e.g. `MG-RNG-25`.
    pub key: String,

    /// Highest serial issued by counter extension.
    pub value: u32,

    /// Bumped on every write; guards the compare-and-swap update.
    pub version: i64,

    /// When the counter was last extended.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Tagged Item
// =============================================================================

/// A tagged inventory item as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaggedItem {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub brand: String,
    /// Matches the category segment of a counter key.
    pub category_code: String,
    /// Warehouse / showroom the tag was printed for.
    pub location_code: String,
    /// Four-digit tagging year.
    pub year: i32,
    /// Serial within `(category_code, year)`; never mutated.
    pub serial: u32,
    /// Formatted barcode value printed on the tag.
    pub barcode: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A tagged item before it is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewTaggedItem {
    pub brand: String,
    pub category_code: String,
    pub location_code: String,
    pub year: i32,
    pub serial: u32,
}

impl NewTaggedItem {
    /// Assigns an id, formats the barcode and stamps the creation time.
    pub fn into_item(self, pad: usize, now: DateTime<Utc>) -> CoreResult<TaggedItem> {
        let barcode = BarcodeValue::new(
            &self.brand,
            &self.category_code,
            &self.location_code,
            self.year,
            self.serial,
        )?
        .with_pad(pad)?
        .to_string();

        Ok(TaggedItem {
            id: Uuid::new_v4().to_string(),
            brand: self.brand,
            category_code: self.category_code,
            location_code: self.location_code,
            year: self.year,
            serial: self.serial,
            barcode,
            created_at: now,
        })
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// Result of reserving serials for one batch.
///
/// The serials are held (not yet owned by items) until the batch is
/// committed, released, or `expires_at` passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reservation {
    pub counter_key: String,
    /// Identifies the holds backing this reservation.
    pub batch_id: String,
    /// Smallest reserved serial (0 for an empty reservation).
    pub start: u32,
    /// Largest reserved serial (0 for an empty reservation).
    pub end: u32,
    /// Reserved serials, strictly ascending.
    pub serials: Vec<u32>,
    /// How many serials were reused from gaps.
    pub gaps_used: u32,
    /// How many serials extended the counter.
    pub extended: u32,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Builds a reservation from ascending serials.
    pub fn new(
        counter_key: impl Into<String>,
        batch_id: impl Into<String>,
        serials: Vec<u32>,
        gaps_used: u32,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let start = serials.first().copied().unwrap_or(0);
        let end = serials.last().copied().unwrap_or(0);
        let len = u32::try_from(serials.len()).unwrap_or(u32::MAX);
        let gaps_used = gaps_used.min(len);
        let extended = len - gaps_used;

        Reservation {
            counter_key: counter_key.into(),
            batch_id: batch_id.into(),
            start,
            end,
            serials,
            gaps_used,
            extended,
            expires_at: Some(expires_at),
        }
    }

    /// Reservation for a request of zero serials.
    pub fn empty(counter_key: impl Into<String>) -> Self {
        Reservation {
            counter_key: counter_key.into(),
            batch_id: String::new(),
            start: 0,
            end: 0,
            serials: Vec::new(),
            gaps_used: 0,
            extended: 0,
            expires_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.serials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serials.is_empty()
    }

    /// Checks whether `serial` belongs to this reservation.
    pub fn contains(&self, serial: u32) -> bool {
        self.serials.binary_search(&serial).is_ok()
    }

    /// One unsaved item per reserved serial, tagged for `location_code`.
    pub fn new_items(&self, location_code: &str) -> CoreResult<Vec<NewTaggedItem>> {
        let key: CounterKey = self.counter_key.parse()?;

        Ok(self
            .serials
            .iter()
            .map(|&serial| NewTaggedItem {
                brand: key.brand().to_string(),
                category_code: key.category_code().to_string(),
                location_code: location_code.to_string(),
                year: key.year(),
                serial,
            })
            .collect())
    }
}

// =============================================================================
// Counter Status
// =============================================================================

/// Snapshot of one serial stream, for the tagging screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CounterStatus {
    pub counter_key: String,
    /// `None` until the first reservation extends the counter.
    pub counter: Option<Counter>,
    /// Live items in the key's category and year.
    pub live_items: u32,
    /// Serials currently held by unsaved batches.
    pub held: u32,
    /// Free serials at or below the counter value.
    pub gaps: Vec<u32>,
}

impl CounterStatus {
    /// Counter value, treating a missing counter as 0.
    pub fn value(&self) -> u32 {
        self.counter.as_ref().map_or(0, |c| c.value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_bounds() {
        let r = Reservation::new("MG-RNG-25", "batch-1", vec![3, 5, 7, 11, 12], 3, Utc::now());
        assert_eq!(r.start, 3);
        assert_eq!(r.end, 12);
        assert_eq!(r.gaps_used, 3);
        assert_eq!(r.extended, 2);
        assert!(r.contains(7));
        assert!(!r.contains(8));
    }

    #[test]
    fn test_gaps_used_clamped_to_serial_count() {
        let r = Reservation::new("MG-RNG-25", "b1", vec![4], 3, Utc::now());
        assert_eq!(r.gaps_used, 1);
        assert_eq!(r.extended, 0);

        let r = Reservation::new("MG-RNG-25", "b2", Vec::new(), 2, Utc::now());
        assert_eq!((r.gaps_used, r.extended), (0, 0));
    }

    #[test]
    fn test_empty_reservation() {
        let r = Reservation::empty("MG-RNG-25");
        assert!(r.is_empty());
        assert_eq!(r.start, 0);
        assert_eq!(r.end, 0);
        assert!(r.expires_at.is_none());
    }

    #[test]
    fn test_reservation_json_shape() {
        let r = Reservation::new("MG-RNG-25", "batch-1", vec![1, 2], 0, Utc::now());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["counter_key"], "MG-RNG-25");
        assert_eq!(json["start"], 1);
        assert_eq!(json["end"], 2);
        assert_eq!(json["serials"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_new_item_gets_barcode() {
        let item = NewTaggedItem {
            brand: "MG".to_string(),
            category_code: "RNG".to_string(),
            location_code: "WH1".to_string(),
            year: 2025,
            serial: 42,
        }
        .into_item(6, Utc::now())
        .unwrap();

        assert_eq!(item.barcode, "MG-RNG-WH1-25-000042");
        assert_eq!(item.id.len(), 36);
    }

    #[test]
    fn test_new_items_follow_key() {
        let r = Reservation::new("MG-RNG-25", "batch-1", vec![4, 9], 1, Utc::now());
        let items = r.new_items("SR2").unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].brand, "MG");
        assert_eq!(items[0].category_code, "RNG");
        assert_eq!(items[0].year, 2025);
        assert_eq!(items[1].serial, 9);
        assert_eq!(items[1].location_code, "SR2");
    }

    #[test]
    fn test_counter_status_value_defaults_to_zero() {
        let status = CounterStatus {
            counter_key: "MG-RNG-25".to_string(),
            counter: None,
            live_items: 0,
            held: 0,
            gaps: Vec::new(),
        };
        assert_eq!(status.value(), 0);
    }
}
