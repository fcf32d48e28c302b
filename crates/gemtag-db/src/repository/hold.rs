//! # Hold Repository
//!
//! Provisional markers for serials that were reserved but not yet saved.
//!
//! ## Hold Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  reserve_serials ──► INSERT serial_holds (batch_id, expires_at_ms)     │
//! │                          │                                              │
//! │          ┌───────────────┼──────────────────┐                           │
//! │          ▼               ▼                  ▼                           │
//! │    commit_batch    release_reservation   TTL passes                    │
//! │    (items saved,   (batch abandoned)     (ignored by scans,            │
//! │     holds deleted)                        purged by next reserve)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A live hold counts as occupied during the gap scan, so a gap handed to
//! one batch cannot be handed to another before the first batch is saved.

use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::to_u32;
use crate::error::DbResult;

/// Rows per multi-row INSERT; 4 binds each stays under SQLite's
/// 32766 bound-parameter limit.
const HOLD_INSERT_CHUNK: usize = 1000;

/// Inserts holds for every serial of a batch.
///
/// Large batches are split into several statements on the same connection,
/// so they stay inside the caller's transaction.
pub(crate) async fn insert_batch(
    conn: &mut SqliteConnection,
    counter_key: &str,
    batch_id: &str,
    serials: &[u32],
    expires_at: DateTime<Utc>,
) -> DbResult<()> {
    let expires_at_ms = expires_at.timestamp_millis();

    for chunk in serials.chunks(HOLD_INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO serial_holds (counter_key, serial, batch_id, expires_at_ms) ",
        );
        builder.push_values(chunk, |mut row, serial| {
            row.push_bind(counter_key)
                .push_bind(i64::from(*serial))
                .push_bind(batch_id)
                .push_bind(expires_at_ms);
        });

        builder.build().execute(&mut *conn).await?;
    }

    debug!(
        counter_key = %counter_key,
        batch_id = %batch_id,
        count = serials.len(),
        "Holds inserted"
    );
    Ok(())
}

/// Serials held for `counter_key` that have not expired at `now`.
pub(crate) async fn live_serials_in<'e, E>(
    executor: E,
    counter_key: &str,
    now: DateTime<Utc>,
) -> DbResult<Vec<u32>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let serials: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT serial
        FROM serial_holds
        WHERE counter_key = ?1 AND expires_at_ms > ?2
        ORDER BY serial
        "#,
    )
    .bind(counter_key)
    .bind(now.timestamp_millis())
    .fetch_all(executor)
    .await?;

    serials
        .into_iter()
        .map(|s| to_u32("serial_holds.serial", s))
        .collect()
}

/// Serials of one batch that are still live at `now`.
pub(crate) async fn batch_serials_in<'e, E>(
    executor: E,
    batch_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Vec<u32>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let serials: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT serial
        FROM serial_holds
        WHERE batch_id = ?1 AND expires_at_ms > ?2
        ORDER BY serial
        "#,
    )
    .bind(batch_id)
    .bind(now.timestamp_millis())
    .fetch_all(executor)
    .await?;

    serials
        .into_iter()
        .map(|s| to_u32("serial_holds.serial", s))
        .collect()
}

/// Deletes every hold of a batch, live or expired.
pub(crate) async fn delete_batch<'e, E>(executor: E, batch_id: &str) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM serial_holds WHERE batch_id = ?1")
        .bind(batch_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Deletes holds whose expiry is at or before `now`.
pub(crate) async fn purge_expired_in<'e, E>(executor: E, now: DateTime<Utc>) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM serial_holds WHERE expires_at_ms <= ?1")
        .bind(now.timestamp_millis())
        .execute(executor)
        .await?;

    let purged = result.rows_affected();
    if purged > 0 {
        debug!(purged, "Expired holds purged");
    }
    Ok(purged)
}

/// Repository for reservation holds.
#[derive(Debug, Clone)]
pub struct HoldRepository {
    pool: SqlitePool,
}

impl HoldRepository {
    /// Creates a new HoldRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HoldRepository { pool }
    }

    /// Serials currently held for a counter key.
    pub async fn live_serials(&self, counter_key: &str) -> DbResult<Vec<u32>> {
        live_serials_in(&self.pool, counter_key, Utc::now()).await
    }

    /// Releases every hold of a batch.
    ///
    /// ## Returns
    /// Number of holds removed (0 if the batch was unknown or already gone).
    pub async fn release_batch(&self, batch_id: &str) -> DbResult<u64> {
        let released = delete_batch(&self.pool, batch_id).await?;
        info!(batch_id = %batch_id, released, "Batch holds released");
        Ok(released)
    }

    /// Deletes all expired holds (cleanup).
    pub async fn purge_expired(&self) -> DbResult<u64> {
        purge_expired_in(&self.pool, Utc::now()).await
    }

    /// Counts live holds for a counter key.
    pub async fn count_live(&self, counter_key: &str) -> DbResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM serial_holds WHERE counter_key = ?1 AND expires_at_ms > ?2",
        )
        .bind(counter_key)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        to_u32("count", count)
    }
}
