//! # Repository Module
//!
//! Database repository implementations for the serial store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and the Allocator                       │
//! │                                                                         │
//! │  Batch generation flow                                                 │
//! │       │                                                                 │
//! │       │  db.allocator(config).reserve_serials("MG-RNG-25", 5)          │
//! │       ▼                                                                 │
//! │  SerialAllocator ── one transaction ──┐                                │
//! │       │                               │                                │
//! │       │  *_in(conn, ...) functions    │  same SQL, shared with         │
//! │       ▼                               ▼  the pool-backed repositories  │
//! │  counter.rs        item.rs         hold.rs                             │
//! │  CounterRepository TaggedItemRepo  HoldRepository                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module exposes a repository struct holding a pool for standalone
//! reads and writes, plus `pub(crate)` free functions taking an executor so
//! the allocator can run the same statements inside its transaction.
//!
//! ## Available Repositories
//!
//! - [`CounterRepository`] - Counter reads (writes go through the allocator)
//! - [`TaggedItemRepository`] - Tagged item CRUD and serial lookups
//! - [`HoldRepository`] - Reservation hold inspection and cleanup

pub mod counter;
pub mod hold;
pub mod item;

pub use counter::CounterRepository;
pub use hold::HoldRepository;
pub use item::TaggedItemRepository;

use crate::error::{DbError, DbResult};

/// Narrows a stored INTEGER into a `u32` domain value.
pub(crate) fn to_u32(column: &str, value: i64) -> DbResult<u32> {
    u32::try_from(value).map_err(|_| DbError::CorruptValue {
        column: column.to_string(),
        value,
    })
}
