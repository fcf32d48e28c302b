//! # Serial Allocator
//!
//! Reserves serial numbers for tagging batches, reusing gaps left by deleted
//! items before extending the per-key counter.
//!
//! ## Reservation Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve_serials("MG-RNG-25", 5)                                       │
//! │       │                                                                 │
//! │       ▼  parse key → brand MG, category RNG, year 2025 (fail fast)     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. DELETE expired serial_holds   ← first write takes the lock  │   │
//! │  │  2. SELECT counter value V        (missing → 0)                 │   │
//! │  │  3. occupied = item serials (RNG, 2025) ∪ live holds            │   │
//! │  │     gaps     = [1, V] \ occupied                                │   │
//! │  │  4. take the smallest gaps, extend V for the rest               │   │
//! │  │  5. INSERT / CAS-UPDATE counter   (only when extending)         │   │
//! │  │  6. INSERT serial_holds for every returned serial               │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼  COMMIT  (busy / conflict → back off and rerun the whole tx)   │
//! │  Reservation { start, end, serials, batch_id, expires_at }             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Batch Lifecycle
//! ```text
//! reserve_serials ──► print tags ──► commit_batch        (items saved)
//!                                └─► release_reservation (batch abandoned)
//!                                └─► hold TTL passes     (same as release)
//! ```
//!
//! Counter extensions are never rolled back. Serials past the old counter
//! value that were reserved but never saved become gaps once their holds
//! are gone, and are reused by later reservations.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gemtag_core::allocation::{find_gaps, plan_allocation};
use gemtag_core::validation::validate_batch_size;
use gemtag_core::{
    AllocationPlan, CounterKey, CounterStatus, NewTaggedItem, Reservation, TaggedItem,
    ValidationError,
};

use crate::config::{AllocatorConfig, GapScanPolicy, RetrySettings};
use crate::error::{AllocError, AllocResult, DbError, DbResult};
use crate::repository::{counter, hold, item};

/// Transactional serial allocator.
///
/// ## Usage
/// ```rust,ignore
/// let allocator = db.allocator(AllocatorConfig::default());
///
/// let reservation = allocator.reserve_serials("MG-RNG-25", 5).await?;
/// let items = reservation.new_items("WH1")?;
/// allocator.commit_batch(&reservation, items).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SerialAllocator {
    pool: SqlitePool,
    config: AllocatorConfig,
}

impl SerialAllocator {
    /// Creates an allocator over an existing pool.
    pub fn new(pool: SqlitePool, config: AllocatorConfig) -> Self {
        SerialAllocator { pool, config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    // =========================================================================
    // Reservation
    // =========================================================================

    /// Reserves `count` serials for `counter_key`.
    ///
    /// ## Returns
    /// Ascending, distinct serials. Gaps in `[1, counter value]` are used
    /// first (smallest first); the counter is extended only for the rest.
    ///
    /// ## Errors
    /// * `AllocError::Core` - malformed key, count above `max_batch_size`,
    ///   or serial overflow (no store access for the first two)
    /// * `AllocError::GapScanFailed` - existing-items query failed under
    ///   [`GapScanPolicy::Strict`]
    /// * `AllocError::RetriesExhausted` - the store stayed busy or contended
    /// * `AllocError::Config` - `hold_ttl_secs` cannot be added to the clock
    /// * `AllocError::Db` - any other store failure
    ///
    /// Nothing is committed when an error is returned.
    pub async fn reserve_serials(&self, counter_key: &str, count: u32) -> AllocResult<Reservation> {
        let key: CounterKey = counter_key.parse()?;

        if count == 0 {
            debug!(counter_key = %key, "Zero-count reservation, nothing to do");
            return Ok(Reservation::empty(key.to_string()));
        }

        validate_batch_size(count, self.config.max_batch_size)?;

        let reservation = self
            .with_retry(&key.to_string(), || self.try_reserve(&key, count))
            .await?;

        info!(
            counter_key = %reservation.counter_key,
            batch_id = %reservation.batch_id,
            count,
            start = reservation.start,
            end = reservation.end,
            gaps_used = reservation.gaps_used,
            extended = reservation.extended,
            "Serials reserved"
        );

        Ok(reservation)
    }

    /// One reservation attempt in one transaction.
    async fn try_reserve(&self, key: &CounterKey, count: u32) -> AllocResult<Reservation> {
        let key_str = key.to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        hold::purge_expired_in(&mut *tx, now).await?;

        let current = counter::fetch(&mut *tx, &key_str).await?;
        let value = current.as_ref().map_or(0, |c| c.value);

        let gaps = self.gaps_or_policy(&mut tx, key, value, now).await?;
        let plan = plan_allocation(value, &gaps, count)?;

        if plan.extends_counter() {
            match current {
                None => counter::create(&mut *tx, &key_str, plan.new_counter_value(), now).await?,
                Some(_) => {
                    counter::compare_and_set(
                        &mut *tx,
                        &key_str,
                        value,
                        plan.new_counter_value(),
                        now,
                    )
                    .await?
                }
            }
        }

        let batch_id = Uuid::new_v4().to_string();
        let expires_at = self.config.hold_expiry(now)?;
        hold::insert_batch(&mut tx, &key_str, &batch_id, plan.serials(), expires_at).await?;

        tx.commit().await.map_err(DbError::from)?;

        let gaps_used = plan.gaps_used() as u32;
        Ok(Reservation::new(
            key_str,
            batch_id,
            plan.into_serials(),
            gaps_used,
            expires_at,
        ))
    }

    /// Runs the gap scan and applies the configured failure policy.
    async fn gaps_or_policy(
        &self,
        conn: &mut SqliteConnection,
        key: &CounterKey,
        value: u32,
        now: DateTime<Utc>,
    ) -> AllocResult<Vec<u32>> {
        match scan_gaps(conn, key, value, now).await {
            Ok(gaps) => Ok(gaps),
            Err(source) if source.is_retryable() => Err(source.into()),
            Err(source) => match self.config.gap_scan_policy {
                GapScanPolicy::Strict => Err(AllocError::GapScanFailed {
                    key: key.to_string(),
                    source,
                }),
                GapScanPolicy::AssumeNoGaps => {
                    warn!(
                        counter_key = %key,
                        error = %source,
                        "Gap scan failed, extending counter without gap reuse"
                    );
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Dry run of a reservation: which serials would be issued right now.
    ///
    /// Writes nothing. A concurrent reservation may take the same serials
    /// before the caller reserves them.
    pub async fn preview(&self, counter_key: &str, count: u32) -> AllocResult<AllocationPlan> {
        let key: CounterKey = counter_key.parse()?;
        if count > 0 {
            validate_batch_size(count, self.config.max_batch_size)?;
        }

        let now = Utc::now();
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;

        let value = counter::fetch(&mut *conn, &key.to_string())
            .await?
            .map_or(0, |c| c.value);
        let gaps = self.gaps_or_policy(&mut conn, &key, value, now).await?;

        Ok(plan_allocation(value, &gaps, count)?)
    }

    // =========================================================================
    // Batch Save / Release
    // =========================================================================

    /// Saves the items of a reserved batch and clears its holds.
    ///
    /// Every item must match the reservation's brand, category and year and
    /// carry a distinct serial from the reservation. Items may cover a subset
    /// of the reserved serials; the holds on the rest are released with the
    /// batch.
    ///
    /// ## Errors
    /// * `AllocError::Core` - an item doesn't belong to the reservation
    /// * `AllocError::ReservationNotHeld` - holds expired or were released
    /// * `AllocError::Db` - e.g. `UniqueViolation` if the serial is taken
    pub async fn commit_batch(
        &self,
        reservation: &Reservation,
        items: Vec<NewTaggedItem>,
    ) -> AllocResult<Vec<TaggedItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let key: CounterKey = reservation.counter_key.parse()?;
        check_items_match(reservation, &key, &items)?;

        let now = Utc::now();
        let pad = self.config.barcode_pad;
        let tagged = items
            .into_iter()
            .map(|item| item.into_item(pad, now))
            .collect::<Result<Vec<_>, _>>()?;

        self.with_retry(&reservation.counter_key, || {
            self.try_commit(reservation, &tagged)
        })
        .await?;

        info!(
            counter_key = %reservation.counter_key,
            batch_id = %reservation.batch_id,
            saved = tagged.len(),
            "Batch committed"
        );

        Ok(tagged)
    }

    async fn try_commit(&self, reservation: &Reservation, items: &[TaggedItem]) -> AllocResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        hold::purge_expired_in(&mut *tx, now).await?;

        let held: HashSet<u32> = hold::batch_serials_in(&mut *tx, &reservation.batch_id, now)
            .await?
            .into_iter()
            .collect();

        if let Some(missing) = items.iter().find(|i| !held.contains(&i.serial)) {
            debug!(
                batch_id = %reservation.batch_id,
                serial = missing.serial,
                "Serial no longer held"
            );
            return Err(AllocError::ReservationNotHeld {
                batch_id: reservation.batch_id.clone(),
            });
        }

        for tagged in items {
            item::insert(&mut *tx, tagged).await?;
        }
        hold::delete_batch(&mut *tx, &reservation.batch_id).await?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    /// Releases the holds of an abandoned batch.
    ///
    /// ## Returns
    /// Number of holds removed. Releasing an unknown, expired or committed
    /// batch is not an error and returns 0.
    pub async fn release_reservation(&self, batch_id: &str) -> AllocResult<u64> {
        let released = hold::delete_batch(&self.pool, batch_id).await?;
        info!(batch_id = %batch_id, released, "Reservation released");
        Ok(released)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Current state of one serial stream.
    pub async fn counter_status(&self, counter_key: &str) -> AllocResult<CounterStatus> {
        let key: CounterKey = counter_key.parse()?;
        let key_str = key.to_string();
        let now = Utc::now();

        let counter = counter::fetch(&self.pool, &key_str).await?;
        let value = counter.as_ref().map_or(0, |c| c.value);

        let items = item::serials_in(&self.pool, key.category_code(), key.year()).await?;
        let holds = hold::live_serials_in(&self.pool, &key_str, now).await?;

        let occupied: BTreeSet<u32> = items.iter().chain(holds.iter()).copied().collect();
        let gaps = find_gaps(value, &occupied);

        Ok(CounterStatus {
            counter_key: key_str,
            counter,
            live_items: items.len() as u32,
            held: holds.len() as u32,
            gaps,
        })
    }

    // =========================================================================
    // Retry
    // =========================================================================

    /// Reruns `attempt` while it fails with a retryable error.
    async fn with_retry<T, F, Fut>(&self, key: &str, mut attempt: F) -> AllocResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AllocResult<T>>,
    {
        let retry = &self.config.retry;
        let mut backoff = create_backoff(retry);
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    if attempts > retry.max_retries {
                        warn!(counter_key = %key, attempts, error = %e, "Giving up after retries");
                        return Err(AllocError::RetriesExhausted {
                            key: key.to_string(),
                            attempts,
                        });
                    }

                    let delay = backoff.next_backoff().unwrap_or_else(|| retry.max_backoff());
                    warn!(
                        counter_key = %key,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transaction contended, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Computes the gaps in `[1, value]` not taken by a live item or hold.
async fn scan_gaps(
    conn: &mut SqliteConnection,
    key: &CounterKey,
    value: u32,
    now: DateTime<Utc>,
) -> DbResult<Vec<u32>> {
    let items = item::serials_in(&mut *conn, key.category_code(), key.year()).await?;
    let holds = hold::live_serials_in(&mut *conn, &key.to_string(), now).await?;

    let occupied: BTreeSet<u32> = items.into_iter().chain(holds).collect();
    let gaps = find_gaps(value, &occupied);

    debug!(
        counter_key = %key,
        value,
        occupied = occupied.len(),
        gaps = gaps.len(),
        "Gap scan complete"
    );
    Ok(gaps)
}

/// Rejects items that don't belong to the reservation.
fn check_items_match(
    reservation: &Reservation,
    key: &CounterKey,
    items: &[NewTaggedItem],
) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(items.len());

    for item in items {
        if item.brand != key.brand()
            || item.category_code != key.category_code()
            || item.year != key.year()
        {
            return Err(ValidationError::InvalidFormat {
                field: "item".to_string(),
                reason: format!(
                    "{}-{}-{} does not belong to {}",
                    item.brand, item.category_code, item.year, reservation.counter_key
                ),
            });
        }

        if !reservation.contains(item.serial) {
            return Err(ValidationError::InvalidFormat {
                field: "serial".to_string(),
                reason: format!(
                    "{} is not part of reservation {}",
                    item.serial, reservation.batch_id
                ),
            });
        }

        if !seen.insert(item.serial) {
            return Err(ValidationError::InvalidFormat {
                field: "serial".to_string(),
                reason: format!("{} appears twice in the batch", item.serial),
            });
        }
    }

    Ok(())
}

/// Creates the backoff schedule for contended transactions.
fn create_backoff(retry: &RetrySettings) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: retry.initial_backoff(),
        initial_interval: retry.initial_backoff(),
        max_interval: retry.max_backoff(),
        multiplier: 2.0,
        max_elapsed_time: None, // bounded by max_retries instead
        ..Default::default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
