use chrono::{Duration, NaiveTime};

use crate::error::ValidationError;
use crate::interval::{Interval, TimeRange};

/// A bookable block of exactly one granularity step.
pub type Slot = TimeRange;

/// Step between selectable times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Granularity(Duration);

impl Granularity {
    pub fn minutes(minutes: i64) -> Result<Self, ValidationError> {
        if minutes <= 0 {
            return Err(ValidationError::InvalidGranularity(minutes));
        }
        Ok(Self(Duration::minutes(minutes)))
    }

    pub fn as_minutes(&self) -> i64 {
        self.0.num_minutes()
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self(Duration::minutes(30))
    }
}

// None when the step would wrap past midnight.
fn step(t: NaiveTime, by: Duration) -> Option<NaiveTime> {
    let (next, wrapped) = t.overflowing_add_signed(by);
    (wrapped == 0).then_some(next)
}

/// Cut every free interval into consecutive slots starting at its start.
/// A trailing remainder shorter than one step is dropped.
pub fn quantize(free: &[TimeRange], granularity: Granularity) -> Vec<Slot> {
    let mut slots = Vec::new();
    for interval in free {
        let mut start = interval.start();
        while let Some(end) = step(start, granularity.0) {
            if end > interval.end() {
                break;
            }
            slots.extend(Interval::non_empty(start, end));
            start = end;
        }
    }
    slots
}

/// Every time a booking may start at.
pub fn start_times(free: &[TimeRange], granularity: Granularity) -> Vec<NaiveTime> {
    quantize(free, granularity)
        .iter()
        .map(|slot| slot.start())
        .collect()
}

/// Every valid end for a booking starting at `start`, bounded by the free
/// interval that contains `start`. Empty when `start` is not free.
pub fn end_times(
    free: &[TimeRange],
    start: NaiveTime,
    granularity: Granularity,
) -> Vec<NaiveTime> {
    let Some(enclosing) = free.iter().find(|f| f.contains_point(start)) else {
        return Vec::new();
    };

    let mut ends = Vec::new();
    let mut cursor = start;
    while let Some(next) = step(cursor, granularity.0) {
        if next > enclosing.end() {
            break;
        }
        ends.push(next);
        cursor = next;
    }
    ends
}
