//! HTTP endpoint handlers
//!
//! Each handler maps one engine command or query; the engine does all
//! validation.

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::{stream, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::{
    state::{AppState, StatsSnapshot, Timer},
    store::{ArchiveQuery, CompletedTimerRecord},
};
use super::responses::{ApiError, ClearedResponse, CreateTimerRequest, HealthResponse};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Handle GET /timers - List every live timer
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Timer>> {
    Ok(Json(state.engine.list()?))
}

/// Handle POST /timers - Create a timer for a badge
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTimerRequest>,
) -> Result<(StatusCode, Json<Timer>), ApiError> {
    let timer = state.engine.create(&request.badge, request.duration_ms())?;
    Ok((StatusCode::CREATED, Json(timer)))
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Timer> {
    Ok(Json(state.engine.get(&id)?))
}

/// Handle DELETE /timers/:id
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Timer> {
    Ok(Json(state.engine.delete(&id)?))
}

/// Handle DELETE /timers/completed - Drop completed timers from the live list
pub async fn clear_completed_handler(State(state): State<Arc<AppState>>) -> ApiResult<ClearedResponse> {
    let removed = state.engine.clear_completed()?;
    Ok(Json(ClearedResponse { removed }))
}

/// Handle POST /timers/:id/start - Start or resume
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Timer> {
    Ok(Json(state.engine.start(&id)?))
}

/// Handle POST /timers/:id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Timer> {
    Ok(Json(state.engine.pause(&id)?))
}

/// Handle POST /timers/:id/stop - Cancel before expiry
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Timer> {
    Ok(Json(state.engine.stop(&id)?))
}

/// Handle POST /timers/:id/reset
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Timer> {
    Ok(Json(state.engine.reset(&id)?))
}

/// Handle GET /stats
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatsSnapshot> {
    Ok(Json(state.engine.stats()?))
}

/// Handle GET /archive - Completed-timer report with optional filters
pub async fn archive_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArchiveQuery>,
) -> ApiResult<Vec<CompletedTimerRecord>> {
    Ok(Json(state.engine.archive_query(&query)?))
}

/// Handle GET /events - Server-sent stream of engine events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Event subscriber connected");
    let rx = state.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.data() {
                    Ok(data) => {
                        let sse = Event::default().event(event.name()).data(data);
                        return Some((Ok(sse), rx));
                    }
                    Err(e) => warn!("Failed to encode {} event: {}", event.name(), e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.get_uptime()))
}
