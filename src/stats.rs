//! Occupancy figures for boxes over one or more days.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

use crate::availability::merge_busy;
use crate::interval::TimeRange;

/// Raw minute counts. Ratios are derived on demand so that totals over
/// several boxes or days stay exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub bookings: usize,
    /// Sum of booking lengths, overlaps counted twice.
    pub booked_minutes: i64,
    /// Working-day minutes covered by at least one booking.
    pub occupied_minutes: i64,
    pub available_minutes: i64,
    /// Gaps between the first and the last booking of a day.
    pub idle_minutes: i64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Occupancy {
    /// Figures for one box on one day, given its bookings.
    pub fn for_day(window: TimeRange, busy: &[TimeRange]) -> Self {
        let clipped: Vec<TimeRange> = busy.iter().filter_map(|b| b.clip(&window)).collect();
        let merged = merge_busy(&clipped);

        let idle_minutes = merged
            .windows(2)
            .map(|pair| (pair[1].start() - pair[0].end()).num_minutes())
            .sum();

        Self {
            bookings: busy.len(),
            booked_minutes: busy.iter().map(|b| b.minutes()).sum(),
            occupied_minutes: merged.iter().map(|b| b.minutes()).sum(),
            available_minutes: window.minutes(),
            idle_minutes,
        }
    }

    pub fn free_minutes(&self) -> i64 {
        self.available_minutes - self.occupied_minutes
    }

    /// Share of the working time that is booked, in percent with two decimals.
    pub fn occupancy_percent(&self) -> f64 {
        if self.available_minutes == 0 {
            return 0.0;
        }
        round2(self.occupied_minutes as f64 / self.available_minutes as f64 * 100.0)
    }

    pub fn average_booking_minutes(&self) -> f64 {
        if self.bookings == 0 {
            return 0.0;
        }
        round2(self.booked_minutes as f64 / self.bookings as f64)
    }
}

impl AddAssign for Occupancy {
    fn add_assign(&mut self, other: Self) {
        self.bookings += other.bookings;
        self.booked_minutes += other.booked_minutes;
        self.occupied_minutes += other.occupied_minutes;
        self.available_minutes += other.available_minutes;
        self.idle_minutes += other.idle_minutes;
    }
}

impl Add for Occupancy {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Sum for Occupancy {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}
