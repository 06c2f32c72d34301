use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::availability::normalize_free_blocks;
use crate::error::BookingError;
use crate::interval::TimeRange;
use crate::models::{ApiErrorBody, Booking, BookingRecord, FreeBlocksResponse};

/// HTTP client for the box scheduling API.
#[derive(Clone)]
pub struct BoxApiClient {
    client: Client,
    base_url: String,
}

impl BoxApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Raw free blocks as the server reports them.
    pub async fn get_free_blocks(
        &self,
        resource_id: u32,
        date: NaiveDate,
    ) -> Result<Vec<TimeRange>, BookingError> {
        let resp = self
            .client
            .get(self.url("free-blocks"))
            .query(&[
                ("resourceId", resource_id.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await?;

        let body: FreeBlocksResponse = read_json(resp, "Free blocks").await?;
        debug!(
            "Fetched {} free blocks for box {} on {}",
            body.free_blocks.len(),
            resource_id,
            date
        );
        Ok(body.free_blocks)
    }

    /// Free intervals of one box, re-derived inside the working-day `window`.
    pub async fn free_intervals(
        &self,
        window: TimeRange,
        resource_id: u32,
        date: NaiveDate,
    ) -> Result<Vec<TimeRange>, BookingError> {
        let blocks = self.get_free_blocks(resource_id, date).await?;
        Ok(normalize_free_blocks(window, &blocks))
    }

    /// Bookings on `date`, optionally restricted to one box.
    pub async fn get_bookings(
        &self,
        date: NaiveDate,
        resource_id: Option<u32>,
    ) -> Result<Vec<BookingRecord>, BookingError> {
        let mut query = vec![("date", date.format("%Y-%m-%d").to_string())];
        if let Some(id) = resource_id {
            query.push(("resourceId", id.to_string()));
        }

        let resp = self
            .client
            .get(self.url("bookings"))
            .query(&query)
            .send()
            .await?;

        read_json(resp, "Bookings").await
    }

    pub async fn create_booking(&self, booking: &Booking) -> Result<BookingRecord, BookingError> {
        let resp = self
            .client
            .post(self.url("bookings"))
            .json(booking)
            .send()
            .await?;

        let record: BookingRecord = read_json(resp, "Create booking").await?;
        info!(
            "Booked box {} on {} {} (booking {})",
            record.booking.resource_id, record.booking.date, record.booking.range, record.id
        );
        Ok(record)
    }

    pub async fn release_booking(&self, id: u64) -> Result<(), BookingError> {
        let resp = self
            .client
            .delete(self.url(&format!("bookings/{id}")))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!("Release response (status {}): {}", status, text);
        check_status(status, &text, "Release booking")?;
        info!("Released booking {}", id);
        Ok(())
    }
}

fn error_message(text: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(text)
        .map(|body| body.error)
        .unwrap_or_else(|_| text.trim().to_string())
}

fn check_status(status: StatusCode, text: &str, what: &str) -> Result<(), BookingError> {
    if status == StatusCode::CONFLICT {
        return Err(BookingError::Conflict(error_message(text)));
    }
    if !status.is_success() {
        return Err(BookingError::Network(format!(
            "{what} failed (status {status}): {}",
            error_message(text)
        )));
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, BookingError> {
    let status = resp.status();
    let text = resp.text().await?;
    debug!("{} response (status {}): {}", what, status, text);
    check_status(status, &text, what)?;

    serde_json::from_str(&text).map_err(|e| {
        BookingError::Network(format!("Failed to parse {what} response (status {status}): {e}"))
    })
}
