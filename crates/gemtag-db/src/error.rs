//! # Database Error Types
//!
//! Error types for database operations and serial reservation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization (busy / conflict / ...)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AllocError ← What the batch-generation flow sees                      │
//! │       │        (retryable DbErrors are retried before surfacing)       │
//! │       ▼                                                                 │
//! │  Web app blocks batch generation and shows the message                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use gemtag_core::{CoreError, ValidationError};
use thiserror::Error;

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and retry decisions.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Saving an item whose (category_code, year, serial) is already live
    /// - Inserting a hold for a serial that is already held
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Database is busy or locked by another writer.
    ///
    /// ## When This Occurs
    /// - Another reservation holds the write lock past `busy_timeout`
    /// - A deferred transaction could not upgrade to a write transaction
    #[error("Database busy: {0}")]
    Busy(String),

    /// Compare-and-swap update of a counter lost against another writer.
    #[error("Concurrent update of counter {key} (expected value {expected})")]
    Conflict { key: String, expected: u32 },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored value doesn't fit the domain type (e.g. negative serial).
    #[error("Corrupt {column} value: {value}")]
    CorruptValue { column: String, value: i64 },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether re-running the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::Conflict { .. })
    }
}

/// SQLite primary result codes SQLITE_BUSY and SQLITE_LOCKED.
fn is_busy_code(code: &str) -> bool {
    code.parse::<i32>()
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy/locked, UNIQUE, or QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let busy = db_err.code().map(|c| is_busy_code(&c)).unwrap_or(false)
                    || msg.contains("database is locked")
                    || msg.contains("database table is locked");

                if busy {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>, ..."
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Configuration Error
// =============================================================================

/// Allocator configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting is out of range or unparseable.
    #[error("Invalid allocator configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Allocation Error
// =============================================================================

/// Errors surfaced by [`crate::SerialAllocator`].
///
/// Every variant means nothing was committed: no counter write and no holds.
#[derive(Debug, Error)]
pub enum AllocError {
    /// Bad key, bad count, or serial overflow.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store failure (after retries for retryable errors).
    #[error(transparent)]
    Db(#[from] DbError),

    /// The existing-items query failed under the strict gap-scan policy.
    ///
    /// Gaps computed from a partial item list could hand out a live serial,
    /// so the reservation is aborted instead.
    #[error("Gap scan failed for {key}: {source}")]
    GapScanFailed {
        key: String,
        #[source]
        source: DbError,
    },

    /// `hold_ttl_secs` cannot produce a valid expiry.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Busy/conflict retries ran out.
    #[error("Reservation for {key} abandoned after {attempts} attempts")]
    RetriesExhausted { key: String, attempts: u32 },

    /// The batch's holds are gone (expired, released, or already committed).
    #[error("Reservation {batch_id} is no longer held")]
    ReservationNotHeld { batch_id: String },
}

impl From<ValidationError> for AllocError {
    fn from(err: ValidationError) -> Self {
        AllocError::Core(CoreError::Validation(err))
    }
}

impl AllocError {
    /// Whether the internal retry loop should try the transaction again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AllocError::Db(e) => e.is_retryable(),
            AllocError::GapScanFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code("5"));
        assert!(is_busy_code("6"));
        assert!(is_busy_code("517")); // SQLITE_BUSY_SNAPSHOT
        assert!(!is_busy_code("2067")); // SQLITE_CONSTRAINT_UNIQUE
        assert!(!is_busy_code("garbage"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::Busy("locked".into()).is_retryable());
        assert!(DbError::Conflict {
            key: "MG-RNG-25".into(),
            expected: 3
        }
        .is_retryable());
        assert!(!DbError::QueryFailed("no such table".into()).is_retryable());
        // Waiting for a pooled connection already timed out once.
        assert!(!DbError::PoolExhausted.is_retryable());
        assert!(!AllocError::Db(DbError::PoolExhausted).is_retryable());

        let err = AllocError::GapScanFailed {
            key: "MG-RNG-25".into(),
            source: DbError::QueryFailed("no such table: tagged_items".into()),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("Gap scan failed for MG-RNG-25"));
    }

    #[test]
    fn test_validation_converts_to_alloc_error() {
        let err: AllocError = ValidationError::MustBePositive {
            field: "serial".into(),
        }
        .into();
        assert!(matches!(err, AllocError::Core(CoreError::Validation(_))));
    }
}
