use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::interval::{hhmm, Interval, TimeRange};
use crate::slots::Granularity;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub api: ApiConfig,
    #[serde(default)]
    pub workday: WorkdayConfig,
    #[serde(default)]
    pub boxes: Vec<BoxEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub push_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
    /// Period of the dashboard's full recompute, independent of push events.
    #[serde(default = "default_resync_secs")]
    pub resync_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkdayConfig {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub granularity_minutes: i64,
}

impl Default for WorkdayConfig {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            granularity_minutes: 30,
        }
    }
}

impl WorkdayConfig {
    pub fn window(&self) -> Result<TimeRange, ValidationError> {
        Interval::new(self.start, self.end)
    }

    pub fn granularity(&self) -> Result<Granularity, ValidationError> {
        Granularity::minutes(self.granularity_minutes)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BoxEntry {
    pub id: u32,
    #[serde(default)]
    pub corridor: Option<String>,
}

fn default_timezone() -> String {
    "America/Santiago".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_reconnect_secs() -> u64 {
    5
}

fn default_resync_secs() -> u64 {
    60
}

/// A booking draft as sent to `POST /bookings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(alias = "box_id")]
    pub resource_id: u32,
    #[serde(alias = "fecha")]
    pub date: NaiveDate,
    #[serde(flatten)]
    pub range: TimeRange,
    #[serde(alias = "responsable")]
    pub responsible: String,
    #[serde(default, alias = "observaciones")]
    pub notes: String,
}

/// A booking persisted by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: u64,
    #[serde(flatten)]
    pub booking: Booking,
}

#[derive(Debug, Deserialize)]
pub struct FreeBlocksResponse {
    #[serde(rename = "freeBlocks", alias = "bloques_libres")]
    pub free_blocks: Vec<TimeRange>,
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(alias = "message", alias = "mensaje")]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::r;

    #[test]
    fn test_booking_wire_format() {
        let booking = Booking {
            resource_id: 12,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            range: r("10:00", "11:30"),
            responsible: "Dra. Soto".into(),
            notes: String::new(),
        };
        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resourceId": 12,
                "date": "2026-10-20",
                "start": "10:00",
                "end": "11:30",
                "responsible": "Dra. Soto",
                "notes": ""
            })
        );
    }

    #[test]
    fn test_record_accepts_legacy_keys() {
        let record: BookingRecord = serde_json::from_str(
            r#"{"id": 7, "box_id": 3, "fecha": "2026-10-20", "hora_inicio": "09:00",
                "hora_fin": "09:30", "responsable": "Aseo", "habilitada": 0}"#,
        )
        .unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.booking.resource_id, 3);
        assert_eq!(record.booking.range, r("09:00", "09:30"));
        assert!(record.booking.notes.is_empty());
    }

    #[test]
    fn test_free_blocks_response_shapes() {
        let current: FreeBlocksResponse =
            serde_json::from_str(r#"{"freeBlocks": [{"start": "08:00", "end": "09:00"}]}"#)
                .unwrap();
        assert_eq!(current.free_blocks, vec![r("08:00", "09:00")]);

        let raw = r#"{"bloques_libres": [
            {"hora_inicio": "10:00", "hora_fin": "13:00", "duracion_minutos": 180}
        ]}"#;
        let legacy: FreeBlocksResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(legacy.free_blocks, vec![r("10:00", "13:00")]);
    }
}
