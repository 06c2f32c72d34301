use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{AppState, BoxBoard};
use crate::availability::derive_free_intervals;
use crate::clock;
use crate::conflicts;
use crate::interval::TimeRange;
use crate::models::BookingRecord;
use crate::push::PushEvent;
use crate::stats::Occupancy;

/// Recompute a board from scratch out of the box's bookings.
pub(crate) fn build_board(
    window: TimeRange,
    bookings: &[BookingRecord],
    box_id: u32,
    date: NaiveDate,
) -> BoxBoard {
    let records: Vec<BookingRecord> = bookings
        .iter()
        .filter(|b| b.booking.resource_id == box_id && b.booking.date == date)
        .cloned()
        .collect();
    let busy: Vec<TimeRange> = records.iter().map(|b| b.booking.range).collect();
    let conflicting = conflicts::conflicting_ids(&conflicts::find_conflicts(&records)).len();

    BoxBoard {
        box_id,
        date,
        free: derive_free_intervals(window, &busy),
        occupancy: Occupancy::for_day(window, &busy),
        conflicting,
        records,
        error: None,
    }
}

pub(crate) async fn refresh_box(state: &AppState, box_id: u32) {
    let env = &state.env;
    let date = clock::today(env.tz);
    let board = match env.client.get_bookings(date, Some(box_id)).await {
        Ok(bookings) => build_board(env.window, &bookings, box_id, date),
        Err(e) => {
            warn!("Failed to refresh box {}: {}", box_id, e);
            BoxBoard {
                box_id,
                date,
                records: Vec::new(),
                free: Vec::new(),
                conflicting: 0,
                occupancy: Occupancy::default(),
                error: Some(e.to_string()),
            }
        }
    };
    state.boards.lock().await.insert(box_id, board);
}

pub(crate) async fn refresh_all(state: &AppState) {
    for entry in &state.env.config.boxes {
        refresh_box(state, entry.id).await;
    }
}

/// Applies push events one at a time, so a box never has two refreshes in
/// flight. Every (re)connect and every `resync` tick rebuilds all boards,
/// which covers notifications lost while the socket was down and the day
/// rolling over.
pub(crate) async fn board_watcher(
    state: AppState,
    mut events: mpsc::Receiver<PushEvent>,
    resync: Duration,
) {
    info!("Board watcher started (full refresh every {}s)", resync.as_secs());
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + resync, resync);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PushEvent::Connected) => {
                    info!("Push channel connected, recomputing all boards");
                    refresh_all(&state).await;
                }
                Some(PushEvent::Changed(change)) => {
                    *state.last_push.lock().await = Some(clock::now(state.env.tz));
                    let known = state
                        .env
                        .config
                        .boxes
                        .iter()
                        .any(|b| b.id == change.resource_id);
                    if !known {
                        debug!("Ignoring change for unlisted box {}", change.resource_id);
                        continue;
                    }
                    info!("Box {} changed, recomputing", change.resource_id);
                    refresh_box(&state, change.resource_id).await;
                }
                None => break,
            },
            _ = ticker.tick() => {
                debug!("Periodic board refresh");
                refresh_all(&state).await;
            }
        }
    }
    warn!("Board watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Env;
    use crate::conflicts::BoxStatus;
    use crate::interval::{r, t};
    use crate::models::{Booking, Config};
    use crate::push::ScheduleChanged;
    use crate::settings::Settings;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(id: u64, box_id: u32, start: &str, end: &str) -> BookingRecord {
        BookingRecord {
            id,
            booking: Booking {
                resource_id: box_id,
                date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                range: r(start, end),
                responsible: "x".into(),
                notes: String::new(),
            },
        }
    }

    fn state_for(server: &MockServer) -> AppState {
        let config: Config = toml::from_str(&format!(
            r#"
            [api]
            base_url = "{}"

            [workday]
            start = "00:00"
            end = "23:59"
            granularity_minutes = 30

            [[boxes]]
            id = 3

            [[boxes]]
            id = 4
            "#,
            server.uri()
        ))
        .unwrap();
        AppState::new(Env::from_config(config).unwrap(), Settings::default())
    }

    fn day_long_booking(state: &AppState, box_id: u32) -> serde_json::Value {
        let today = clock::today(state.env.tz).format("%Y-%m-%d").to_string();
        json!([{
            "id": 1, "resourceId": box_id, "date": today, "start": "00:00",
            "end": "23:59", "responsible": "a", "notes": ""
        }])
    }

    async fn mount_bookings(server: &MockServer, box_id: u32, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .and(query_param("resourceId", box_id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn wait_for<F>(state: &AppState, done: F) -> bool
    where
        F: Fn(&HashMap<u32, BoxBoard>) -> bool,
    {
        for _ in 0..100 {
            if done(&*state.boards.lock().await) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    fn occupied(boards: &HashMap<u32, BoxBoard>, box_id: u32) -> bool {
        boards.get(&box_id).is_some_and(|b| b.free.is_empty())
    }

    #[test]
    fn test_build_board_counts_and_free_intervals() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let bookings = vec![
            record(1, 5, "09:00", "10:00"),
            record(2, 5, "09:30", "11:00"),
            record(3, 5, "14:00", "15:00"),
            record(4, 6, "08:00", "18:00"),
        ];

        let board = build_board(r("08:00", "18:00"), &bookings, 5, date);
        assert_eq!(board.status_at(t("09:45")), BoxStatus::Conflict);
        assert_eq!(board.status_at(t("14:30")), BoxStatus::Occupied);
        assert_eq!(board.status_at(t("11:00")), BoxStatus::Available);
        assert_eq!(board.records.len(), 3);
        assert_eq!(board.conflicting, 2);
        assert_eq!(
            board.free,
            vec![r("08:00", "09:00"), r("11:00", "14:00"), r("15:00", "18:00")]
        );
        assert_eq!(board.occupancy.occupied_minutes, 180);
        assert_eq!(board.occupancy.occupancy_percent(), 30.0);
    }

    #[tokio::test]
    async fn test_change_rebuilds_only_that_box() {
        let server = MockServer::start().await;
        let state = state_for(&server);
        mount_bookings(&server, 3, day_long_booking(&state, 3)).await;
        mount_bookings(&server, 4, json!([])).await;

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(board_watcher(state.clone(), rx, Duration::from_secs(3600)));
        tx.send(PushEvent::Changed(ScheduleChanged { resource_id: 99 }))
            .await
            .unwrap();
        tx.send(PushEvent::Changed(ScheduleChanged { resource_id: 3 }))
            .await
            .unwrap();

        assert!(wait_for(&state, |boards| occupied(boards, 3)).await);
        assert!(!state.boards.lock().await.contains_key(&4));
        assert!(state.last_push.lock().await.is_some());
    }

    #[tokio::test]
    async fn test_reconnect_rebuilds_every_box() {
        let server = MockServer::start().await;
        let state = state_for(&server);
        mount_bookings(&server, 3, json!([])).await;
        mount_bookings(&server, 4, day_long_booking(&state, 4)).await;

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(board_watcher(state.clone(), rx, Duration::from_secs(3600)));
        tx.send(PushEvent::Connected).await.unwrap();

        assert!(wait_for(&state, |boards| boards.len() == 2 && occupied(boards, 4)).await);
    }

    #[tokio::test]
    async fn test_periodic_refresh_without_push_events() {
        let server = MockServer::start().await;
        let state = state_for(&server);
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .and(query_param("resourceId", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_bookings(&server, 3, day_long_booking(&state, 3)).await;
        mount_bookings(&server, 4, json!([])).await;

        refresh_all(&state).await;
        assert!(!occupied(&*state.boards.lock().await, 3));

        // the push channel never delivers anything
        let (_tx, rx) = mpsc::channel(8);
        tokio::spawn(board_watcher(state.clone(), rx, Duration::from_millis(50)));

        assert!(wait_for(&state, |boards| occupied(boards, 3)).await);
    }
}
