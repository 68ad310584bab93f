//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, warn};

use crate::{
    error::{AppError, TimerError},
    state::{AppState, Participant, ParticipantId},
};
use super::responses::{BoardResponse, CreateTimerRequest, HealthResponse, TimerResponse};

/// Map a registry error onto an HTTP status, logging it on the way
fn error_status(e: AppError) -> StatusCode {
    warn!("Request failed: {}", e);
    match e {
        AppError::UnknownTimer(_) => StatusCode::NOT_FOUND,
        AppError::TimerExists(_) => StatusCode::CONFLICT,
        AppError::Timer(TimerError::EmptyStages | TimerError::InvalidStage { .. }) => {
            StatusCode::BAD_REQUEST
        }
        AppError::Timer(TimerError::NotConfigured(_) | TimerError::InvalidState { .. }) => {
            StatusCode::CONFLICT
        }
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerAction {
    Start,
    Pause,
    Resume,
    Stop,
    Skip,
}

async fn run_action(
    state: &AppState,
    name: &str,
    action: TimerAction,
) -> Result<Json<TimerResponse>, StatusCode> {
    let timer = state.timer(name).map_err(error_status)?;
    let result = match action {
        TimerAction::Start => timer.start().await,
        TimerAction::Pause => timer.pause().await,
        TimerAction::Resume => timer.resume().await,
        TimerAction::Stop => {
            timer.stop().await;
            Ok(())
        }
        TimerAction::Skip => timer.skip().await,
    };
    result.map_err(|e| error_status(e.into()))?;

    info!("{:?} applied to timer '{}'", action, name);
    Ok(Json(TimerResponse::ok(
        format!("{:?} applied", action),
        Some(timer.snapshot().await),
    )))
}

/// Handle POST /timers/:name - Create and set up a timer
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<CreateTimerRequest>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let snapshot = state
        .create_timer(&name, &request.channel, request.audience, request.stages)
        .await
        .map_err(error_status)?;
    Ok(Json(TimerResponse::ok(
        format!("Timer '{}' created", name),
        Some(snapshot),
    )))
}

/// Handle DELETE /timers/:name - Stop and remove a timer
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let parked = state.remove_timer(&name).await.map_err(error_status)?;
    Ok(Json(TimerResponse::ok(
        format!("Timer '{}' removed, {} subscribers parked", name, parked),
        None,
    )))
}

/// Handle GET /timers/:name - Current timer snapshot
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let timer = state.timer(&name).map_err(error_status)?;
    Ok(Json(TimerResponse::ok(
        timer.pretty_pinstatus().await,
        Some(timer.snapshot().await),
    )))
}

/// Handle POST /timers/:name/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    run_action(&state, &name, TimerAction::Start).await
}

/// Handle POST /timers/:name/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    run_action(&state, &name, TimerAction::Pause).await
}

/// Handle POST /timers/:name/resume
pub async fn resume_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    run_action(&state, &name, TimerAction::Resume).await
}

/// Handle POST /timers/:name/stop
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    run_action(&state, &name, TimerAction::Stop).await
}

/// Handle POST /timers/:name/skip - Force-advance to the next stage
pub async fn skip_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimerResponse>, StatusCode> {
    run_action(&state, &name, TimerAction::Skip).await
}

/// Handle POST /timers/:name/stage/:index - Jump to a stage
pub async fn change_stage_handler(
    State(state): State<Arc<AppState>>,
    Path((name, index)): Path<(String, i64)>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let timer = state.timer(&name).map_err(error_status)?;
    timer
        .change_stage(index, true, true)
        .await
        .map_err(|e| error_status(e.into()))?;
    Ok(Json(TimerResponse::ok(
        format!("Timer '{}' moved to stage {}", name, index),
        Some(timer.snapshot().await),
    )))
}

/// Handle POST /timers/:name/subscribers - Join a timer
pub async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(participant): Json<Participant>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let id = participant.id;
    let joined = state.subscribe(&name, participant).await.map_err(error_status)?;
    let message = if joined {
        format!("Participant {} subscribed", id)
    } else {
        format!("Participant {} was already subscribed", id)
    };
    let timer = state.timer(&name).map_err(error_status)?;
    Ok(Json(TimerResponse::ok(message, Some(timer.snapshot().await))))
}

/// Handle DELETE /timers/:name/subscribers/:id - Leave a timer
pub async fn unsubscribe_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, ParticipantId)>,
) -> Result<Json<TimerResponse>, StatusCode> {
    match state.unsubscribe(&name, id).await.map_err(error_status)? {
        Some(session) => Ok(Json(TimerResponse::ok(
            format!(
                "Participant {} left after {} active seconds",
                id, session.clocked_seconds
            ),
            None,
        ))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Handle POST /timers/:name/subscribers/:id/ack - Presence acknowledgement
pub async fn ack_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, ParticipantId)>,
) -> Result<Json<TimerResponse>, StatusCode> {
    let timer = state.timer(&name).map_err(error_status)?;
    if !timer.bump(id).await {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(TimerResponse::ok(
        format!("Presence recorded for {}", id),
        None,
    )))
}

/// Handle GET /channels/:channel - Current status board
pub async fn board_handler(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> Json<BoardResponse> {
    let content = state.board_content(&channel).await;
    Json(BoardResponse { channel, content })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, StatusCode> {
    let timers = state.timer_names().map_err(error_status)?.len();
    Ok(Json(HealthResponse::ok(state.get_uptime(), state.address(), timers)))
}

/// Fallback body for unknown routes
pub async fn not_found_handler() -> (StatusCode, Json<TimerResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(TimerResponse::error("No such endpoint".to_string())),
    )
}
