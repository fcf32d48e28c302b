//! # gemtag-core: Pure Serial Allocation Logic
//!
//! This crate is the **heart** of Gemtag. It decides which serial numbers a
//! tag batch receives, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gemtag Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Web app: "Generate Batch" (external)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ reserve_serials("MG-RNG-25", 10)       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               gemtag-db (SerialAllocator, SQLite)               │   │
//! │  │        transaction, holds, counter CAS, retry/backoff           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ gemtag-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │    key    │  │ allocation │  │  barcode  │  │ validation│  │   │
//! │  │   │CounterKey │  │ find_gaps  │  │  format   │  │   rules   │  │   │
//! │  │   │ MG-RNG-25 │  │ plan       │  │  parse    │  │  checks   │  │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`key`] - Counter keys (`{BRAND}-{CATEGORY}-{YY}`)
//! - [`allocation`] - Gap scan and allocation planning
//! - [`barcode`] - Barcode value formatting and parsing
//! - [`types`] - Domain types (Counter, TaggedItem, Reservation)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use gemtag_core::allocation::{find_gaps, plan_allocation};
//! use std::collections::BTreeSet;
//!
//! // Counter is at 8, items 3, 5 and 7 were deleted.
//! let live: BTreeSet<u32> = [1, 2, 4, 6, 8].into_iter().collect();
//! let gaps = find_gaps(8, &live);
//! assert_eq!(gaps, vec![3, 5, 7]);
//!
//! // Gaps are filled first, then the counter is extended.
//! let plan = plan_allocation(8, &gaps, 5).unwrap();
//! assert_eq!(plan.serials(), &[3, 5, 7, 9, 10]);
//! assert_eq!(plan.new_counter_value(), 10);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod barcode;
pub mod error;
pub mod key;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use allocation::AllocationPlan;
pub use barcode::BarcodeValue;
pub use error::{CoreError, CoreResult, ValidationError};
pub use key::CounterKey;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Century added to the two-digit year segment of a counter key.
///
/// `MG-RNG-25` scans items tagged in year `2000 + 25 = 2025`.
pub const YEAR_BASE: i32 = 2000;

/// Default zero-padding width of the serial segment in a barcode value.
pub const DEFAULT_BARCODE_PAD: usize = 6;

/// Default upper bound on serials handed out by one reservation.
///
/// ## Business Reason
/// A tag sheet run is a few hundred labels at most; anything larger is
/// almost certainly a typo in the batch size field.
pub const DEFAULT_MAX_BATCH_SIZE: u32 = 1000;
