use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A half-open period `[start, end)` with `start < end`.
///
/// Generic over the wall-clock value so the same arithmetic serves
/// same-day times (`TimeRange`) and full timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval<T> {
    start: T,
    end: T,
}

/// Same-day period, the shape exchanged with the scheduling API.
pub type TimeRange = Interval<NaiveTime>;

impl<T: Ord + Copy + fmt::Display> Interval<T> {
    pub fn new(start: T, end: T) -> Result<Self, ValidationError> {
        Self::non_empty(start, end).ok_or_else(|| ValidationError::EmptyRange {
            start: start.to_string(),
            end: end.to_string(),
        })
    }
}

impl<T: Ord + Copy> Interval<T> {
    /// Returns `None` for zero-length or inverted bounds.
    pub fn non_empty(start: T, end: T) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn start(&self) -> T {
        self.start
    }

    pub fn end(&self) -> T {
        self.end
    }

    /// Half-open overlap: intervals that only touch at an endpoint do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_point(&self, t: T) -> bool {
        self.start <= t && t < self.end
    }

    /// Moves `end` later; an earlier `end` is ignored so `start < end` holds.
    pub(crate) fn stretch_to(&mut self, end: T) {
        if end > self.end {
            self.end = end;
        }
    }

    /// The part of `self` inside `window`, if any.
    pub fn clip(&self, window: &Self) -> Option<Self> {
        Self::non_empty(self.start.max(window.start), self.end.min(window.end))
    }
}

impl TimeRange {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Parse a wall-clock time given as `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| ValidationError::InvalidTime(raw.to_string()))
}

/// Serde adapter writing `HH:MM` and reading `HH:MM` or `HH:MM:SS`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize, Deserialize)]
struct WireRange {
    #[serde(alias = "hora_inicio", with = "hhmm")]
    start: NaiveTime,
    #[serde(alias = "hora_fin", with = "hhmm")]
    end: NaiveTime,
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        WireRange {
            start: self.start,
            end: self.end,
        }
        .serialize(s)
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let wire = WireRange::deserialize(d)?;
        Interval::new(wire.start, wire.end).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub(crate) fn t(hhmm: &str) -> NaiveTime {
    parse_time(hhmm).unwrap()
}

#[cfg(test)]
pub(crate) fn r(start: &str, end: &str) -> TimeRange {
    Interval::new(t(start), t(end)).unwrap()
}
