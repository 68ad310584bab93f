//! HTTP API module
//!
//! Endpoints that drive timers and expose their status boards.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/timers/:name",
            post(create_timer_handler)
                .get(get_timer_handler)
                .delete(delete_timer_handler),
        )
        .route("/timers/:name/start", post(start_handler))
        .route("/timers/:name/pause", post(pause_handler))
        .route("/timers/:name/resume", post(resume_handler))
        .route("/timers/:name/stop", post(stop_handler))
        .route("/timers/:name/skip", post(skip_handler))
        .route("/timers/:name/stage/:index", post(change_stage_handler))
        .route("/timers/:name/subscribers", post(subscribe_handler))
        .route(
            "/timers/:name/subscribers/:id",
            delete(unsubscribe_handler),
        )
        .route("/timers/:name/subscribers/:id/ack", post(ack_handler))
        .route("/channels/:channel", get(board_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
