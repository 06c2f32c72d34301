use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::error::ValidationError;

/// Current wall-clock time in the hospital's timezone.
pub fn now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

pub fn today(tz: Tz) -> NaiveDate {
    now(tz).date_naive()
}

pub fn time_of_day(tz: Tz) -> NaiveTime {
    now(tz).time()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Reject dates before `today`. Today itself is allowed.
pub fn ensure_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if date < today {
        return Err(ValidationError::PastDate(date));
    }
    Ok(())
}

pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.parse::<Tz>().ok()
}
