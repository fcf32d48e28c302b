//! # Allocation Planning
//!
//! Pure gap scan and allocation policy. The database layer feeds in the
//! counter value and the occupied serials it read inside its transaction,
//! and persists whatever plan comes back.
//!
//! ## Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  counter = 8, live serials = {1, 2, 4, 6, 8}, request = 5               │
//! │                                                                         │
//! │  1..=8:   1  2  [3]  4  [5]  6  [7]  8         gaps = [3, 5, 7]          │
//! │                                                                         │
//! │  fill gaps (smallest first) ──► 3, 5, 7        gaps_used = 3            │
//! │  extend counter for the rest ─► 9, 10          counter 8 → 10           │
//! │                                                                         │
//! │  result (ascending): [3, 5, 7, 9, 10]                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Returns the ascending serials in `[1, counter_value]` absent from `occupied`.
///
/// Occupied serials above the counter value are ignored.
pub fn find_gaps(counter_value: u32, occupied: &BTreeSet<u32>) -> Vec<u32> {
    (1..=counter_value)
        .filter(|serial| !occupied.contains(serial))
        .collect()
}

/// The serials a reservation will hand out, and how the counter moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationPlan {
    /// Counter value the plan was computed against.
    base_value: u32,
    /// Reused serials, ascending.
    gap_serials: Vec<u32>,
    /// Fresh serials beyond `base_value`, ascending.
    extended_serials: Vec<u32>,
    /// Union of the two, ascending.
    serials: Vec<u32>,
    /// Gaps available when the plan was made.
    #[ts(type = "number")]
    gaps_available: usize,
}

impl AllocationPlan {
    /// Counter value before the reservation.
    pub fn base_value(&self) -> u32 {
        self.base_value
    }

    /// Counter value after the reservation commits.
    pub fn new_counter_value(&self) -> u32 {
        self.extended_serials
            .last()
            .copied()
            .unwrap_or(self.base_value)
    }

    /// Whether the counter has to be written.
    pub fn extends_counter(&self) -> bool {
        !self.extended_serials.is_empty()
    }

    /// All planned serials, ascending.
    pub fn serials(&self) -> &[u32] {
        &self.serials
    }

    /// Serials taken from gaps.
    pub fn gap_serials(&self) -> &[u32] {
        &self.gap_serials
    }

    /// Serials taken by extending the counter.
    pub fn extended_serials(&self) -> &[u32] {
        &self.extended_serials
    }

    /// Number of serials reused from gaps.
    pub fn gaps_used(&self) -> usize {
        self.gap_serials.len()
    }

    /// Number of gaps that existed when the plan was made.
    pub fn gaps_available(&self) -> usize {
        self.gaps_available
    }

    pub fn into_serials(self) -> Vec<u32> {
        self.serials
    }
}

/// Plans a reservation of `count` serials.
///
/// ## Arguments
/// * `counter_value` - Current counter value (0 when the counter doesn't exist)
/// * `gaps` - Ascending free serials in `[1, counter_value]`
/// * `count` - Number of serials requested
///
/// ## Errors
/// `CoreError::SerialOverflow` when the extension would exceed `u32::MAX`.
pub fn plan_allocation(counter_value: u32, gaps: &[u32], count: u32) -> CoreResult<AllocationPlan> {
    let take = (count as usize).min(gaps.len());
    let gap_serials: Vec<u32> = gaps[..take].to_vec();

    let remaining = count - take as u32;
    let extended_serials: Vec<u32> = if remaining == 0 {
        Vec::new()
    } else {
        let last = counter_value
            .checked_add(remaining)
            .ok_or(CoreError::SerialOverflow {
                current: counter_value,
                requested: remaining,
            })?;
        (counter_value + 1..=last).collect()
    };

    let mut serials = Vec::with_capacity(count as usize);
    serials.extend_from_slice(&gap_serials);
    serials.extend_from_slice(&extended_serials);
    serials.sort_unstable();

    Ok(AllocationPlan {
        base_value: counter_value,
        gap_serials,
        extended_serials,
        serials,
        gaps_available: gaps.len(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn live_except(counter: u32, missing: &[u32]) -> BTreeSet<u32> {
        (1..=counter).filter(|s| !missing.contains(s)).collect()
    }

    #[test]
    fn test_find_gaps() {
        let occupied = live_except(10, &[3, 5, 7]);
        assert_eq!(find_gaps(10, &occupied), vec![3, 5, 7]);
    }

    #[test]
    fn test_find_gaps_ignores_serials_above_counter() {
        let occupied: BTreeSet<u32> = [1, 2, 40].into_iter().collect();
        assert_eq!(find_gaps(3, &occupied), vec![3]);
        assert!(find_gaps(0, &occupied).is_empty());
    }

    #[test]
    fn test_gap_fill_preference() {
        let gaps = find_gaps(10, &live_except(10, &[3, 5, 7]));
        let plan = plan_allocation(10, &gaps, 2).unwrap();

        assert_eq!(plan.serials(), &[3, 5]);
        assert!(!plan.extends_counter());
        assert_eq!(plan.new_counter_value(), 10);
        assert_eq!(plan.gaps_used(), 2);
        assert_eq!(plan.gaps_available(), 3);
    }

    #[test]
    fn test_overflow_beyond_gaps() {
        let gaps = find_gaps(10, &live_except(10, &[3, 5, 7]));
        let plan = plan_allocation(10, &gaps, 5).unwrap();

        assert_eq!(plan.serials(), &[3, 5, 7, 11, 12]);
        assert_eq!(plan.gap_serials(), &[3, 5, 7]);
        assert_eq!(plan.extended_serials(), &[11, 12]);
        assert_eq!(plan.new_counter_value(), 12);
    }

    #[test]
    fn test_cold_start() {
        let plan = plan_allocation(0, &[], 10).unwrap();
        assert_eq!(plan.serials(), (1..=10).collect::<Vec<_>>().as_slice());
        assert_eq!(plan.base_value(), 0);
        assert_eq!(plan.new_counter_value(), 10);
    }

    #[test]
    fn test_serial_overflow() {
        let err = plan_allocation(u32::MAX - 1, &[], 2).unwrap_err();
        assert!(matches!(err, CoreError::SerialOverflow { .. }));

        // Gaps absorb the request, so no extension and no overflow.
        let plan = plan_allocation(u32::MAX, &[4], 1).unwrap();
        assert_eq!(plan.serials(), &[4]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn plan_is_ascending_sized_and_fresh(
            counter in 0u32..200,
            deleted in proptest::collection::btree_set(1u32..200, 0..40),
            count in 1u32..60,
        ) {
            let occupied: BTreeSet<u32> =
                (1..=counter).filter(|s| !deleted.contains(s)).collect();
            let gaps = find_gaps(counter, &occupied);
            let plan = plan_allocation(counter, &gaps, count).unwrap();
            let serials = plan.serials();

            prop_assert_eq!(serials.len(), count as usize);
            prop_assert!(serials.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(serials.iter().all(|s| *s >= 1 && !occupied.contains(s)));
            prop_assert_eq!(
                plan.gaps_used(),
                (count as usize).min(gaps.len())
            );
            prop_assert_eq!(
                plan.new_counter_value(),
                counter + count.saturating_sub(gaps.len() as u32)
            );
        }

        #[test]
        fn repeated_plans_never_reissue(
            counts in proptest::collection::vec(1u32..20, 1..15),
            deleted in proptest::collection::btree_set(1u32..50, 0..10),
        ) {
            // Start from a counter of 50 with some deletions, then apply
            // plans back to back as if every batch was saved.
            let mut occupied: BTreeSet<u32> =
                (1..=50).filter(|s| !deleted.contains(s)).collect();
            let mut counter = 50;
            let mut issued = BTreeSet::new();

            for count in counts {
                let gaps = find_gaps(counter, &occupied);
                let plan = plan_allocation(counter, &gaps, count).unwrap();
                for serial in plan.serials() {
                    prop_assert!(issued.insert(*serial), "serial {} issued twice", serial);
                    occupied.insert(*serial);
                }
                counter = plan.new_counter_value();
            }
        }
    }
}
