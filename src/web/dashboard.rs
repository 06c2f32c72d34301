use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::views::render_page;
use super::{watcher, AppState};
use crate::clock;
use crate::error::BookingError;
use crate::interval::TimeRange;
use crate::models::ApiErrorBody;
use crate::slots;

pub(crate) async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    let today = clock::today(state.env.tz);
    if !state.is_live() || state.needs_refresh(today).await {
        watcher::refresh_all(&state).await;
    }

    let boards = state.boards.lock().await.clone();
    let last_push = *state.last_push.lock().await;
    let env = &state.env;
    Html(render_page(
        &env.config.boxes,
        &boards,
        &state.settings,
        today,
        clock::now(env.tz),
        last_push,
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct FreeQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FreeResponse {
    resource_id: u32,
    date: NaiveDate,
    free_intervals: Vec<TimeRange>,
    start_times: Vec<String>,
}

type ApiError = (StatusCode, Json<ApiErrorBody>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ApiErrorBody {
            error: error.to_string(),
        }),
    )
}

pub(crate) async fn free_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<FreeQuery>,
) -> Result<Json<FreeResponse>, ApiError> {
    let env = &state.env;
    let date = match query.date.as_deref() {
        Some(raw) => clock::parse_date(raw).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Invalid date '{raw}', expected YYYY-MM-DD"),
            )
        })?,
        None => clock::today(env.tz),
    };
    if !env.config.boxes.iter().any(|b| b.id == id) {
        return Err(api_error(StatusCode::NOT_FOUND, format!("Unknown box {id}")));
    }

    let free = env
        .client
        .free_intervals(env.window, id, date)
        .await
        .map_err(|e| match e {
            BookingError::Validation(v) => api_error(StatusCode::BAD_REQUEST, v),
            other => api_error(StatusCode::BAD_GATEWAY, other),
        })?;

    let start_times = slots::start_times(&free, env.granularity)
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect();
    Ok(Json(FreeResponse {
        resource_id: id,
        date,
        free_intervals: free,
        start_times,
    }))
}
