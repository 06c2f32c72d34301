use chrono::NaiveDate;
use thiserror::Error;

/// Problems detected locally, before anything is sent to the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("end time {end} must be after start time {start}")]
    EmptyRange { start: String, end: String },

    #[error("date {0} is in the past")]
    PastDate(NaiveDate),

    #[error("{range} is not inside a free interval")]
    NotFree { range: String },

    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("granularity must be a positive number of minutes, got {0}")]
    InvalidGranularity(i64),

    #[error("a responsible party is required")]
    MissingResponsible,

    #[error("cannot {action} while at step {step}")]
    WrongStep { action: &'static str, step: String },

    #[error("unknown box {0}")]
    UnknownResource(u32),
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server refused the booking because it collides with another one.
    #[error("booking conflict: {0}")]
    Conflict(String),

    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for BookingError {
    fn from(e: reqwest::Error) -> Self {
        BookingError::Network(e.to_string())
    }
}
