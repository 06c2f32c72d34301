use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use leptos::prelude::*;

use super::BoxBoard;
use crate::conflicts::BoxStatus;
use crate::models::BoxEntry;
use crate::stats::Occupancy;
use crate::settings::{FontSize, Settings, Theme};

const STYLE: &str = include_str!("../style.css");

fn body_class(settings: &Settings) -> String {
    let theme = match settings.theme {
        Theme::Light => "theme-light",
        Theme::Dark => "theme-dark",
    };
    let size = match settings.font_size {
        FontSize::Small => "font-small",
        FontSize::Medium => "font-medium",
        FontSize::Large => "font-large",
    };
    format!("{theme} {size}")
}

pub(super) fn render_page(
    boxes: &[BoxEntry],
    boards: &HashMap<u32, BoxBoard>,
    settings: &Settings,
    date: NaiveDate,
    now: DateTime<Tz>,
    last_push: Option<DateTime<Tz>>,
) -> String {
    let boxes_html = render_boxes_table(boxes, boards, now.time());
    let now = now.format("%Y-%m-%d %H:%M:%S %Z").to_string();
    let day = format!("Availability for {}", date.format("%Y-%m-%d"));
    let push_status = match last_push {
        Some(t) => format!("Last change notification: {}", t.format("%Y-%m-%d %H:%M:%S")),
        None => "No change notifications yet".to_string(),
    };
    let class = body_class(settings);

    view! {
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <title>"Box Dashboard"</title>
                <style>{STYLE}</style>
            </head>
            <body class=class>
                <h1>"Box Dashboard"</h1>
                <p class="timestamp">"Updated: " {now}</p>
                <p class="watcher-status">{push_status}</p>
                <section>
                    <h2>{day}</h2>
                    <div inner_html=boxes_html />
                </section>
            </body>
        </html>
    }
    .to_html()
}

fn status_class(status: BoxStatus) -> &'static str {
    match status {
        BoxStatus::Available => "status-available",
        BoxStatus::Occupied => "status-occupied",
        BoxStatus::Conflict => "status-conflict",
    }
}

fn percent(occupancy: &Occupancy) -> String {
    format!("{:.2}%", occupancy.occupancy_percent())
}

fn render_boxes_table(
    boxes: &[BoxEntry],
    boards: &HashMap<u32, BoxBoard>,
    at: NaiveTime,
) -> String {
    if boxes.is_empty() {
        return view! { <p class="empty">"No boxes configured."</p> }.to_html();
    }

    let rows_html: String = boxes
        .iter()
        .map(|entry| {
            let id = entry.id.to_string();
            let corridor = entry.corridor.clone().unwrap_or_else(|| "-".to_string());

            let (status, css, free, bookings, conflicts, occupancy, average, idle) =
                match boards.get(&entry.id) {
                    None => (
                        "loading".to_string(),
                        "status-pending",
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                    ),
                    Some(board) if board.error.is_some() => (
                        board.error.clone().unwrap_or_default(),
                        "status-error",
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                    ),
                    Some(board) => {
                        let status = board.status_at(at);
                        let free = if board.free.is_empty() {
                            "fully booked".to_string()
                        } else {
                            board
                                .free
                                .iter()
                                .map(|r| r.to_string())
                                .collect::<Vec<_>>()
                                .join(", ")
                        };
                        (
                            status.to_string(),
                            status_class(status),
                            free,
                            board.records.len().to_string(),
                            board.conflicting.to_string(),
                            percent(&board.occupancy),
                            format!("{:.2}", board.occupancy.average_booking_minutes()),
                            board.occupancy.idle_minutes.to_string(),
                        )
                    }
                };
            let css = css.to_string();

            view! {
                <tr>
                    <td>{id}</td>
                    <td>{corridor}</td>
                    <td class=css>{status}</td>
                    <td>{free}</td>
                    <td class="count">{bookings}</td>
                    <td class="count">{conflicts}</td>
                    <td class="count">{occupancy}</td>
                    <td class="count">{average}</td>
                    <td class="count">{idle}</td>
                </tr>
            }
            .to_html()
        })
        .collect();

    let total: Occupancy = boxes
        .iter()
        .filter_map(|entry| boards.get(&entry.id))
        .filter(|board| board.error.is_none())
        .map(|board| board.occupancy)
        .sum();
    let total_line = format!(
        "Overall occupancy {} ({} of {} minutes booked, {} free, {} idle)",
        percent(&total),
        total.occupied_minutes,
        total.available_minutes,
        total.free_minutes(),
        total.idle_minutes,
    );

    view! {
        <table>
            <thead>
                <tr>
                    <th>"Box"</th>
                    <th>"Corridor"</th>
                    <th>"Status"</th>
                    <th>"Free"</th>
                    <th>"Bookings"</th>
                    <th>"Conflicting"</th>
                    <th>"Occupancy"</th>
                    <th>"Avg min"</th>
                    <th>"Idle min"</th>
                </tr>
            </thead>
            <tbody inner_html=rows_html />
        </table>
        <p class="totals">{total_line}</p>
    }
    .to_html()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::r;
    use crate::models::{Booking, BookingRecord};
    use crate::web::watcher::build_board;
    use chrono::TimeZone;

    fn entry(id: u32) -> BoxEntry {
        BoxEntry {
            id,
            corridor: Some("A".into()),
        }
    }

    fn record(id: u64, start: &str, end: &str) -> BookingRecord {
        BookingRecord {
            id,
            booking: Booking {
                resource_id: 1,
                date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                range: r(start, end),
                responsible: "x".into(),
                notes: String::new(),
            },
        }
    }

    fn sample_boards() -> HashMap<u32, BoxBoard> {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let bookings = vec![record(1, "09:00", "10:00"), record(2, "09:30", "11:00")];
        let mut boards = HashMap::new();
        boards.insert(1, build_board(r("08:00", "18:00"), &bookings, 1, date));
        boards.insert(
            2,
            BoxBoard {
                box_id: 2,
                date,
                records: Vec::new(),
                free: Vec::new(),
                conflicting: 0,
                occupancy: Occupancy::default(),
                error: Some("network error: timed out".into()),
            },
        );
        boards
    }

    #[test]
    fn test_render_page_shows_each_box() {
        let tz = chrono_tz::America::Santiago;
        let now = tz.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).unwrap();
        let settings = Settings {
            theme: Theme::Dark,
            font_size: FontSize::Large,
        };

        let html = render_page(
            &[entry(1), entry(2), entry(3)],
            &sample_boards(),
            &settings,
            now.date_naive(),
            now,
            None,
        );
        assert!(html.contains("theme-dark font-large"));
        assert!(html.contains("Availability for 2026-10-20"));
        assert!(html.contains("08:00-09:00, 11:00-18:00"));
        assert!(html.contains(r#"class="status-conflict""#));
        assert!(html.contains("30.00%"));
        assert!(html.contains("75.00"));
        assert!(html.contains("network error: timed out"));
        assert!(html.contains("loading"));
        assert!(html.contains("No change notifications yet"));
        assert!(html.contains("Overall occupancy 30.00% (180 of 600 minutes booked, 420 free"));
    }

    #[test]
    fn test_status_follows_render_time() {
        let tz = chrono_tz::America::Santiago;
        let boards = sample_boards();
        let render_at = |h, m| {
            let now = tz.with_ymd_and_hms(2026, 10, 20, h, m, 0).unwrap();
            render_page(&[entry(1)], &boards, &Settings::default(), now.date_naive(), now, None)
        };

        assert!(render_at(9, 45).contains(r#"class="status-conflict""#));
        assert!(render_at(10, 30).contains(r#"class="status-occupied""#));
        assert!(render_at(12, 0).contains(r#"class="status-available""#));
    }

    #[test]
    fn test_render_page_without_boxes() {
        let tz = chrono_tz::America::Santiago;
        let now = tz.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).unwrap();
        let html = render_page(
            &[],
            &HashMap::new(),
            &Settings::default(),
            now.date_naive(),
            now,
            Some(now),
        );
        assert!(html.contains("No boxes configured."));
        assert!(html.contains("theme-light font-medium"));
        assert!(html.contains("Last change notification: 2026-10-20 09:30:00"));
    }
}
