//! HTTP surface tests driven through the router.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use stage_timer::{
    api::create_router,
    state::{AppState, Stage, TimerOptions},
    utils::ManualClock,
};
use tower::ServiceExt;

fn app() -> (Router, Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let state = Arc::new(AppState::new(
        0,
        "127.0.0.1".to_string(),
        vec![Stage::new("Work", 25), Stage::new("Break", 5)],
        TimerOptions {
            tick: Duration::from_secs(3600),
            ..TimerOptions::default()
        },
        clock.clone(),
    ));
    (create_router(state.clone()), state, clock)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn create_body() -> Value {
    json!({
        "channel": "lobby",
        "audience": { "group_id": 1, "role_id": 2 }
    })
}

#[tokio::test]
async fn create_start_and_advance() {
    let (app, state, _) = app();

    let (status, body) = send(&app, Method::POST, "/timers/focus", Some(create_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["state"], "stopped");

    let (status, body) = send(&app, Method::POST, "/timers/focus/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["state"], "running");
    assert_eq!(body["timer"]["stage"], "Work");
    assert_eq!(body["timer"]["remaining"], "00:25:00");

    let (_, body) = send(&app, Method::POST, "/timers/focus/skip", None).await;
    assert_eq!(body["timer"]["stage"], "Break");

    let (_, body) = send(&app, Method::POST, "/timers/focus/stage/-2", None).await;
    assert_eq!(body["timer"]["stage"], "Work");
    assert_eq!(body["timer"]["stage_index"], 0);

    assert_eq!(state.notifier.messages().len(), 3);
    send(&app, Method::POST, "/timers/focus/stop", None).await;
}

#[tokio::test]
async fn custom_stages_are_accepted_and_validated() {
    let (app, _, _) = app();

    let mut body = create_body();
    body["stages"] = json!([
        { "name": "Deep", "duration": 50, "focus": true, "modifiers": { "silent": true } },
        { "name": "Rest", "duration": 10, "message": "Stretch." }
    ]);
    let (status, response) = send(&app, Method::POST, "/timers/deep", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["timer"]["stage"], "Deep");
    assert_eq!(response["timer"]["remaining_seconds"], 3000);

    let mut empty = create_body();
    empty["stages"] = json!([]);
    let (status, _) = send(&app, Method::POST, "/timers/empty", Some(empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/timers/empty", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_operations_are_rejected() {
    let (app, _, _) = app();

    let (status, _) = send(&app, Method::POST, "/timers/ghost/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, Method::POST, "/timers/focus", Some(create_body())).await;
    let (status, _) = send(&app, Method::POST, "/timers/focus", Some(create_body())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::POST, "/timers/focus/pause", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn subscribers_join_ack_and_leave() {
    let (app, state, clock) = app();
    send(&app, Method::POST, "/timers/focus", Some(create_body())).await;
    send(&app, Method::POST, "/timers/focus/start", None).await;

    let participant = json!({ "id": 5, "group_id": 1, "name": "ada" });
    let (status, body) = send(
        &app,
        Method::POST,
        "/timers/focus/subscribers",
        Some(participant),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["subscribers"][0]["name"], "ada");

    let (status, _) = send(&app, Method::POST, "/timers/focus/subscribers/5/ack", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::POST, "/timers/focus/subscribers/6/ack", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    clock.advance(chrono::Duration::seconds(90));
    let (status, _) = send(&app, Method::DELETE, "/timers/focus/subscribers/5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.store.sessions()[0].clocked_seconds, 90);

    let (status, _) = send(&app, Method::DELETE, "/timers/focus/subscribers/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    send(&app, Method::POST, "/timers/focus/stop", None).await;
}

#[tokio::test]
async fn board_and_health_endpoints() {
    let (app, state, _) = app();
    send(&app, Method::POST, "/timers/focus", Some(create_body())).await;

    let (_, body) = send(&app, Method::GET, "/channels/lobby", None).await;
    assert_eq!(body["content"], Value::Null);

    for channel in state.channels() {
        channel.lock().await.update().await;
    }
    let (_, body) = send(&app, Method::GET, "/channels/lobby", None).await;
    assert_eq!(body["content"], "**focus**: *Not set up.*");

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timers"], 1);
    assert_eq!(body["address"], "127.0.0.1:0");

    let (status, _) = send(&app, Method::GET, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
