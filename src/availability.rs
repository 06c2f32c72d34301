//! Free interval derivation for one box on one day.
//!
//! Everything here is pure: callers fetch busy periods (or the server's free
//! blocks) and recompute from scratch whenever the schedule changes.

use crate::error::ValidationError;
use crate::interval::{Interval, TimeRange};

/// Sort by start and fuse overlapping or touching busy periods.
pub fn merge_busy<T: Ord + Copy>(busy: &[Interval<T>]) -> Vec<Interval<T>> {
    let mut sorted = busy.to_vec();
    sorted.sort_by_key(|b| b.start());

    let mut merged: Vec<Interval<T>> = Vec::with_capacity(sorted.len());
    for b in sorted {
        match merged.last_mut() {
            Some(last) if b.start() <= last.end() => last.stretch_to(b.end()),
            _ => merged.push(b),
        }
    }
    merged
}

/// Subtract `busy` from `window`.
///
/// Busy periods may arrive unsorted and overlapping; those outside the window
/// are dropped and those crossing its edges are clipped. The result is sorted,
/// pairwise disjoint and contains no zero-length intervals.
pub fn derive_free_intervals<T: Ord + Copy>(
    window: Interval<T>,
    busy: &[Interval<T>],
) -> Vec<Interval<T>> {
    let clipped: Vec<Interval<T>> = busy.iter().filter_map(|b| b.clip(&window)).collect();

    let mut free = Vec::new();
    let mut cursor = window.start();
    for b in merge_busy(&clipped) {
        if let Some(gap) = Interval::non_empty(cursor, b.start()) {
            free.push(gap);
        }
        cursor = cursor.max(b.end());
    }
    if let Some(tail) = Interval::non_empty(cursor, window.end()) {
        free.push(tail);
    }
    free
}

/// Re-derive free blocks reported by the server so they obey the same
/// invariants as locally derived ones (sorted, merged, inside the window).
pub fn normalize_free_blocks<T: Ord + Copy>(
    window: Interval<T>,
    blocks: &[Interval<T>],
) -> Vec<Interval<T>> {
    // the complement of the free blocks is the busy time
    let busy = derive_free_intervals(window, blocks);
    derive_free_intervals(window, &busy)
}

/// The free interval that fully contains `range`, if any.
pub fn enclosing_interval<'a, T: Ord + Copy>(
    range: &Interval<T>,
    free: &'a [Interval<T>],
) -> Option<&'a Interval<T>> {
    free.iter().find(|f| f.contains(range))
}

/// Reject a requested range that is not inside a single free interval.
pub fn ensure_bookable<'a>(
    range: &TimeRange,
    free: &'a [TimeRange],
) -> Result<&'a TimeRange, ValidationError> {
    enclosing_interval(range, free).ok_or_else(|| ValidationError::NotFree {
        range: range.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::r;
    use proptest::prelude::*;

    fn day() -> TimeRange {
        r("08:00", "18:00")
    }

    #[test]
    fn test_two_busy_blocks() {
        let busy = [r("09:00", "10:00"), r("13:00", "14:00")];
        assert_eq!(
            derive_free_intervals(day(), &busy),
            vec![r("08:00", "09:00"), r("10:00", "13:00"), r("14:00", "18:00")]
        );
    }

    #[test]
    fn test_no_busy_means_whole_day() {
        assert_eq!(derive_free_intervals(day(), &[]), vec![day()]);
    }

    #[test]
    fn test_unsorted_overlapping_busy_is_merged() {
        let busy = [
            r("13:00", "14:00"),
            r("09:00", "10:00"),
            r("09:30", "11:00"),
            r("11:00", "11:30"),
        ];
        assert_eq!(
            derive_free_intervals(day(), &busy),
            vec![r("08:00", "09:00"), r("11:30", "13:00"), r("14:00", "18:00")]
        );
    }

    #[test]
    fn test_busy_outside_window_ignored_and_edges_clipped() {
        let busy = [
            r("06:00", "07:00"),
            r("07:30", "08:30"),
            r("17:30", "19:00"),
            r("19:00", "20:00"),
        ];
        assert_eq!(
            derive_free_intervals(day(), &busy),
            vec![r("08:30", "17:30")]
        );
    }

    #[test]
    fn test_fully_booked_day() {
        let busy = [r("08:00", "12:00"), r("12:00", "18:00")];
        assert!(derive_free_intervals(day(), &busy).is_empty());
    }

    #[test]
    fn test_normalize_free_blocks() {
        let blocks = [
            r("14:00", "19:00"),
            r("10:00", "11:00"),
            r("11:00", "13:00"),
            r("07:00", "08:30"),
        ];
        assert_eq!(
            normalize_free_blocks(day(), &blocks),
            vec![r("08:00", "08:30"), r("10:00", "13:00"), r("14:00", "18:00")]
        );
    }

    #[test]
    fn test_request_crossing_free_boundary_is_rejected() {
        let free = vec![r("10:00", "13:00")];
        let err = ensure_bookable(&r("12:45", "13:15"), &free).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotFree {
                range: "12:45-13:15".into()
            }
        );
        assert_eq!(
            ensure_bookable(&r("12:30", "13:00"), &free).unwrap(),
            &r("10:00", "13:00")
        );
    }

    fn busy_strategy() -> impl Strategy<Value = Vec<Interval<i32>>> {
        prop::collection::vec((-60i32..660, 1i32..180), 0..12).prop_map(|raw| {
            raw.into_iter()
                .map(|(start, len)| Interval::new(start, start + len).unwrap())
                .collect()
        })
    }

    fn window() -> Interval<i32> {
        Interval::new(0, 600).unwrap()
    }

    proptest! {
        #[test]
        fn prop_free_sorted_and_disjoint(busy in busy_strategy()) {
            let free = derive_free_intervals(window(), &busy);
            for pair in free.windows(2) {
                prop_assert!(pair[0].end() < pair[1].start());
            }
            for f in &free {
                prop_assert!(window().contains(f));
            }
        }

        #[test]
        fn prop_free_never_overlaps_busy(busy in busy_strategy()) {
            let free = derive_free_intervals(window(), &busy);
            for f in &free {
                for b in &busy {
                    prop_assert!(!f.overlaps(b));
                }
            }
        }

        #[test]
        fn prop_free_and_busy_cover_window(busy in busy_strategy()) {
            let free = derive_free_intervals(window(), &busy);
            let clipped: Vec<_> = busy.iter().filter_map(|b| b.clip(&window())).collect();
            let busy_len: i32 = merge_busy(&clipped).iter().map(|b| b.end() - b.start()).sum();
            let free_len: i32 = free.iter().map(|f| f.end() - f.start()).sum();
            prop_assert_eq!(busy_len + free_len, 600);
        }

        #[test]
        fn prop_merging_is_idempotent(busy in busy_strategy()) {
            let merged = merge_busy(&busy);
            prop_assert_eq!(merge_busy(&merged), merged.clone());
            prop_assert_eq!(
                derive_free_intervals(window(), &merged),
                derive_free_intervals(window(), &busy)
            );
        }
    }
}
