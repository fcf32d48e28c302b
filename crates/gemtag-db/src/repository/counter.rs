//! # Counter Repository
//!
//! Persistent per-key serial counters.
//!
//! ## Compare-and-Swap Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Counter is None (first extension)                                     │
//! │    INSERT INTO counters ... ON CONFLICT(key) DO NOTHING                │
//! │    rows_affected == 0  →  someone created it first  →  Conflict        │
//! │                                                                         │
//! │  Counter is Some(value = V)                                            │
//! │    UPDATE counters SET value = V', version = version + 1               │
//! │    WHERE key = ? AND value = V                                         │
//! │    rows_affected == 0  →  someone extended it first →  Conflict        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The value never decreases; there is no delete.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use super::to_u32;
use crate::error::{DbError, DbResult};
use gemtag_core::Counter;

/// Row shape of the `counters` table.
#[derive(Debug, sqlx::FromRow)]
struct CounterRow {
    key: String,
    value: i64,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CounterRow> for Counter {
    type Error = DbError;

    fn try_from(row: CounterRow) -> DbResult<Self> {
        Ok(Counter {
            value: to_u32("counters.value", row.value)?,
            key: row.key,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

/// Reads one counter.
pub(crate) async fn fetch<'e, E>(executor: E, key: &str) -> DbResult<Option<Counter>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, CounterRow>(
        r#"
        SELECT key, value, version, updated_at
        FROM counters
        WHERE key = ?1
        "#,
    )
    .bind(key)
    .fetch_optional(executor)
    .await?;

    row.map(Counter::try_from).transpose()
}

/// Creates a counter that did not exist yet.
pub(crate) async fn create<'e, E>(
    executor: E,
    key: &str,
    value: u32,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO counters (key, value, version, updated_at)
        VALUES (?1, ?2, 1, ?3)
        ON CONFLICT(key) DO NOTHING
        "#,
    )
    .bind(key)
    .bind(i64::from(value))
    .bind(now)
    .execute(executor)
    .await?;

    if result.rows_affected() != 1 {
        return Err(DbError::Conflict {
            key: key.to_string(),
            expected: 0,
        });
    }

    debug!(key = %key, value, "Counter created");
    Ok(())
}

/// Moves a counter from `expected` to `value`, failing if it changed.
pub(crate) async fn compare_and_set<'e, E>(
    executor: E,
    key: &str,
    expected: u32,
    value: u32,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE counters
        SET
            value = ?3,
            version = version + 1,
            updated_at = ?4
        WHERE key = ?1 AND value = ?2
        "#,
    )
    .bind(key)
    .bind(i64::from(expected))
    .bind(i64::from(value))
    .bind(now)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict {
            key: key.to_string(),
            expected,
        });
    }

    debug!(key = %key, from = expected, to = value, "Counter extended");
    Ok(())
}

/// Repository for counter reads.
///
/// Counters are only ever written by [`crate::SerialAllocator`].
#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: SqlitePool,
}

impl CounterRepository {
    /// Creates a new CounterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CounterRepository { pool }
    }

    /// Gets a counter by key.
    ///
    /// ## Returns
    /// * `Ok(Some(Counter))` - Counter exists
    /// * `Ok(None)` - No serial has been issued by extension for this key
    pub async fn get(&self, key: &str) -> DbResult<Option<Counter>> {
        fetch(&self.pool, key).await
    }

    /// Lists all counters ordered by key.
    pub async fn list(&self) -> DbResult<Vec<Counter>> {
        let rows = sqlx::query_as::<_, CounterRow>(
            r#"
            SELECT key, value, version, updated_at
            FROM counters
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Listed counters");
        rows.into_iter().map(Counter::try_from).collect()
    }
}
