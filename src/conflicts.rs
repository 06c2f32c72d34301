//! Double-booking ("tope") detection between persisted bookings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::models::BookingRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictMark {
    pub booking_id: u64,
    pub conflicting_booking_id: u64,
}

fn same_slot_group(a: &BookingRecord, b: &BookingRecord) -> bool {
    a.booking.resource_id == b.booking.resource_id && a.booking.date == b.booking.date
}

/// Marks for every other booking of the same box and day that overlaps
/// `candidate`. A booking never conflicts with itself.
pub fn conflicts_for(candidate: &BookingRecord, others: &[BookingRecord]) -> Vec<ConflictMark> {
    others
        .iter()
        .filter(|o| o.id != candidate.id && same_slot_group(candidate, o))
        .filter(|o| candidate.booking.range.overlaps(&o.booking.range))
        .map(|o| ConflictMark {
            booking_id: candidate.id,
            conflicting_booking_id: o.id,
        })
        .collect()
}

/// All conflict marks in `bookings`, both directions, sorted.
pub fn find_conflicts(bookings: &[BookingRecord]) -> Vec<ConflictMark> {
    let mut groups: BTreeMap<(u32, NaiveDate), Vec<BookingRecord>> = BTreeMap::new();
    for b in bookings {
        groups
            .entry((b.booking.resource_id, b.booking.date))
            .or_default()
            .push(b.clone());
    }

    let mut marks: Vec<ConflictMark> = groups
        .values()
        .filter(|group| group.len() > 1)
        .flat_map(|group| group.iter().flat_map(move |b| conflicts_for(b, group)))
        .collect();
    marks.sort();
    marks
}

pub fn conflicting_ids(marks: &[ConflictMark]) -> BTreeSet<u64> {
    marks.iter().map(|m| m.booking_id).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxStatus {
    Available,
    Occupied,
    Conflict,
}

impl fmt::Display for BoxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BoxStatus::Available => "available",
            BoxStatus::Occupied => "occupied",
            BoxStatus::Conflict => "conflict",
        };
        f.write_str(label)
    }
}

/// Occupancy of one box at instant `at` on `date`.
pub fn status_at(
    bookings: &[BookingRecord],
    resource_id: u32,
    date: NaiveDate,
    at: NaiveTime,
) -> BoxStatus {
    let active = bookings
        .iter()
        .filter(|b| b.booking.resource_id == resource_id && b.booking.date == date)
        .filter(|b| b.booking.range.contains_point(at))
        .count();
    match active {
        0 => BoxStatus::Available,
        1 => BoxStatus::Occupied,
        _ => BoxStatus::Conflict,
    }
}
