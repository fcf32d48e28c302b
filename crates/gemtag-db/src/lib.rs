//! # gemtag-db: Serial Store for Gemtag
//!
//! SQLite-backed storage for counters, tagged items and reservation holds,
//! plus the transactional [`SerialAllocator`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Batch Tagging Flow                               │
//! │                                                                         │
//! │  Batch generation request ("5 rings for MG, 2025, WH1")                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    gemtag-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ SerialAlloc.  │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (allocator.rs)│    │  counter      │    │  (embedded)  │  │   │
//! │  │   │               │───►│  item         │    │ 001_init.sql │  │   │
//! │  │   │ reserve/commit│    │  hold         │    │ 002_holds.sql│  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ plan_allocation / find_gaps                        │   │
//! │  │           ▼                                                     │   │
//! │  │      gemtag-core (pure logic)                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database, configuration and allocation error types
//! - [`config`] - Allocator configuration (TOML + environment)
//! - [`repository`] - Counter, tagged item and hold repositories
//! - [`allocator`] - Serial reservation, batch commit and release
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gemtag_db::{AllocatorConfig, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/gemtag.db")).await?;
//! let allocator = db.allocator(AllocatorConfig::load_or_default(None));
//!
//! let reservation = allocator.reserve_serials("MG-RNG-25", 5).await?;
//! let items = allocator
//!     .commit_batch(&reservation, reservation.new_items("WH1")?)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::SerialAllocator;
pub use config::{AllocatorConfig, GapScanPolicy, RetrySettings};
pub use error::{AllocError, AllocResult, ConfigError, DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{CounterRepository, HoldRepository, TaggedItemRepository};
