pub mod dashboard;
pub mod views;
pub mod watcher;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::commands::Env;
use crate::conflicts::{self, BoxStatus};
use crate::interval::TimeRange;
use crate::models::BookingRecord;
use crate::push;
use crate::settings::{self, Settings};
use crate::stats::Occupancy;

/// What the dashboard shows for one box on one day.
#[derive(Clone, Debug)]
pub(crate) struct BoxBoard {
    pub(crate) box_id: u32,
    pub(crate) date: NaiveDate,
    pub(crate) records: Vec<BookingRecord>,
    pub(crate) free: Vec<TimeRange>,
    pub(crate) conflicting: usize,
    pub(crate) occupancy: Occupancy,
    pub(crate) error: Option<String>,
}

impl BoxBoard {
    /// Status is evaluated when shown, so it follows the clock between refreshes.
    pub(crate) fn status_at(&self, at: NaiveTime) -> BoxStatus {
        conflicts::status_at(&self.records, self.box_id, self.date, at)
    }
}

pub(crate) type BoardState = Arc<Mutex<HashMap<u32, BoxBoard>>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) env: Arc<Env>,
    pub(crate) settings: Settings,
    pub(crate) boards: BoardState,
    pub(crate) last_push: Arc<Mutex<Option<DateTime<Tz>>>>,
}

impl AppState {
    pub(crate) fn new(env: Env, settings: Settings) -> Self {
        Self {
            env: Arc::new(env),
            settings,
            boards: Arc::new(Mutex::new(HashMap::new())),
            last_push: Arc::new(Mutex::new(None)),
        }
    }

    /// Boards are kept current in the background only when a push URL is set.
    pub(crate) fn is_live(&self) -> bool {
        self.env.config.api.push_url.is_some()
    }

    /// True when a configured box has no board or its board is for another day.
    pub(crate) async fn needs_refresh(&self, today: NaiveDate) -> bool {
        let boards = self.boards.lock().await;
        self.env
            .config
            .boxes
            .iter()
            .any(|b| !matches!(boards.get(&b.id), Some(board) if board.date == today))
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard::dashboard_handler))
        .route("/api/boxes/{id}/free", get(dashboard::free_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(env: Env, config_path: &Path, addr: &str) -> Result<()> {
    let settings_path = config_path
        .parent()
        .unwrap_or(Path::new("."))
        .join("settings.json");
    let state = AppState::new(env, settings::load(&settings_path));

    watcher::refresh_all(&state).await;
    if let Some(push_url) = state.env.config.api.push_url.clone() {
        let events = push::subscribe(
            push_url,
            Duration::from_secs(state.env.config.api.reconnect_secs),
        );
        let resync = Duration::from_secs(state.env.config.api.resync_secs);
        tokio::spawn(watcher::board_watcher(state.clone(), events, resync));
    } else {
        info!("No push_url configured; boards refresh on every page load");
    }

    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
