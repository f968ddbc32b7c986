//! Thin HTTP shell over the scanning core.
//!
//! Handlers validate input and translate between HTTP and the core
//! types; everything stateful lives behind `AppState`.
//!
//! # Endpoints
//!
//! - `GET /api/data` - live snapshot, draining pending events
//! - `POST /api/scan/start` / `POST /api/scan/stop` - session toggles
//! - `GET /api/events[?date=YYYY-MM-DD]` - historical events
//! - `GET /api/events/{id}` - single event
//! - `GET /api/summary` - aggregate counts
//! - `GET /api/export` - CSV dump
//! - `GET /health` - liveness probe

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use log::error;
use serde::Deserialize;
use serde_json::json;

use crate::db::Database;
use crate::error::ScanError;
use crate::live::{LiveSnapshot, LiveState};
use crate::scanner::ScannerController;

/// Shared application state, passed to handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    live: LiveState,
    db: Database,
    scanner: ScannerController,
}

impl AppState {
    pub fn new(live: LiveState, db: Database, scanner: ScannerController) -> Self {
        Self {
            inner: Arc::new(AppStateInner { live, db, scanner }),
        }
    }

    fn live(&self) -> &LiveState {
        &self.inner.live
    }

    fn db(&self) -> &Database {
        &self.inner.db
    }

    fn scanner(&self) -> &ScannerController {
        &self.inner.scanner
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/data", get(live_data_handler))
        .route("/api/scan/start", post(start_scan_handler))
        .route("/api/scan/stop", post(stop_scan_handler))
        .route("/api/events", get(list_events_handler))
        .route("/api/events/{id}", get(event_by_id_handler))
        .route("/api/summary", get(summary_handler))
        .route("/api/export", get(export_handler))
        .with_state(state)
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        let status = match err {
            ScanError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("request failed: {err:#}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Validates a `?date=` query parameter. A malformed value is a client
/// error, never a crash.
fn parse_date_filter(raw: &str) -> Result<NaiveDate, ScanError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ScanError::InvalidFilter(format!("'{raw}' is not a valid date, expected YYYY-MM-DD"))
    })
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Live snapshot. Draining the pending events here is deliberate:
/// this endpoint is the single registered consumer of the queue.
async fn live_data_handler(State(state): State<AppState>) -> Json<LiveSnapshot> {
    Json(state.live().poll())
}

async fn start_scan_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session_id = state.scanner().start().await?;
    Ok(Json(json!({ "status": "scanning", "sessionId": session_id })))
}

async fn stop_scan_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.scanner().stop().await?;
    Ok(Json(json!({ "status": "stopped" })))
}

#[derive(Deserialize)]
struct EventsQuery {
    date: Option<String>,
}

async fn list_events_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let date = query
        .date
        .as_deref()
        .map(parse_date_filter)
        .transpose()
        .map_err(ApiError::from)?;

    let events = state.db().list_events(date).await?;
    Ok(Json(events).into_response())
}

async fn event_by_id_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    match state.db().event_by_id(id).await? {
        Some(event) => Ok(Json(event).into_response()),
        None => Err(ApiError::not_found(format!("event {id} not found"))),
    }
}

async fn summary_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.db().summary(Utc::now()).await?;
    Ok(Json(stats).into_response())
}

async fn export_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let csv = state.db().export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"events.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
