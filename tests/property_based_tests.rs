//! Property-based suites over the pure laws.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use wms_core::generation::{calculate_estimated_seconds, pick_priority};
use wms_core::labor::{shift_duration_seconds, utilization_percent};
use wms_core::state_machine::TaskStatus;

fn base_instant() -> DateTime<Utc> {
    "2026-03-01T00:00:00Z".parse().unwrap()
}

proptest! {
    /// Estimation law: base + units * per_unit, monotonic in units.
    #[test]
    fn estimation_law(units in 1i64..100_000, base in 0i32..10_000, per_unit in 0i32..1_000) {
        let estimate = calculate_estimated_seconds(units, base, per_unit);
        prop_assert_eq!(estimate as i64, base as i64 + units * per_unit as i64);

        let next = calculate_estimated_seconds(units + 1, base, per_unit);
        prop_assert!(next >= estimate);
    }

    /// Priority is monotonically non-increasing in time-until-ship.
    #[test]
    fn priority_law(hours_a in -240i64..240, hours_b in -240i64..240) {
        let now = base_instant();
        let (early, late) = if hours_a <= hours_b { (hours_a, hours_b) } else { (hours_b, hours_a) };
        let p_early = pick_priority(now + Duration::hours(early), now);
        let p_late = pick_priority(now + Duration::hours(late), now);
        prop_assert!(p_early >= p_late, "priority must not increase with later ship dates");
    }

    /// Priority values are drawn from the fixed bucket set.
    #[test]
    fn priority_values_are_bucketed(hours in -1000i64..1000) {
        let now = base_instant();
        let priority = pick_priority(now + Duration::hours(hours), now);
        prop_assert!([50, 70, 90, 100].contains(&priority));
    }

    /// Utilization is always within [0, 100] and two-decimal rounded.
    #[test]
    fn utilization_bounds(active in 0i64..1_000_000, shift in 0u32..200_000) {
        let value = utilization_percent(active, shift);
        prop_assert!((0.0..=100.0).contains(&value));
        let scaled = value * 100.0;
        prop_assert!((scaled - scaled.round()).abs() < 1e-6);
    }

    /// Shift duration matches the wraparound formula and is never negative.
    #[test]
    fn shift_duration_law(start in 0u32..86_400, end in 0u32..86_400) {
        let duration = shift_duration_seconds(start, end);
        if end > start {
            prop_assert_eq!(duration, end - start);
        } else if end == start {
            prop_assert_eq!(duration, 0);
        } else {
            prop_assert_eq!(duration, 86_400 - start + end);
        }
        prop_assert!(duration < 86_400);
    }

    /// Terminal states admit no outgoing transitions; self-transitions are
    /// always rejected.
    #[test]
    fn transition_invariants(from_idx in 0usize..7, to_idx in 0usize..7) {
        let from = TaskStatus::ALL[from_idx];
        let to = TaskStatus::ALL[to_idx];
        if from.is_terminal() || from == to {
            prop_assert!(!from.can_transition_to(to));
        }
        if from.can_transition_to(to) {
            prop_assert!(!from.is_terminal());
        }
    }
}
