use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use conquest_core::{Command, ContestantId, JoinOutcome, MatchPhase};
use serde::Deserialize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS origin {cors_origin:?}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/join", post(join_handler))
        .route("/api/v1/start", post(start_handler))
        .route("/api/v1/command", post(command_handler))
        .route("/api/v1/leave", post(leave_handler))
        .route("/api/v1/stream/:contestant", get(stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[derive(Deserialize)]
pub struct JoinRequest {
    id: ContestantId,
    name: String,
}

#[derive(Deserialize, Default)]
pub struct StartRequest {
    bots: Option<usize>,
}

#[derive(Deserialize)]
pub struct CommandRequest {
    contestant: ContestantId,
    command: Command,
}

#[derive(Deserialize)]
pub struct LeaveRequest {
    contestant: ContestantId,
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let game = app_state.game.lock();
    let meta = &game.state().meta;
    Json(serde_json::json!({
        "match_id": meta.match_id,
        "seed": meta.seed,
        "tick": meta.tick,
        "phase": meta.phase,
        "contestants": game.state().contestants.len(),
        "max_contestants": game.content().constants.max_contestants,
        "content_version": game.content().content_version,
        "ticks_per_sec": app_state.ticks_per_sec,
    }))
}

pub async fn join_handler(
    State(app_state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let outcome = app_state
        .game
        .lock()
        .add_contestant(request.id.clone(), request.name);
    let status = match outcome {
        JoinOutcome::Ok => StatusCode::OK,
        JoinOutcome::Full | JoinOutcome::Duplicate | JoinOutcome::Closed => StatusCode::CONFLICT,
    };
    (
        status,
        Json(serde_json::json!({"contestant": request.id, "outcome": outcome})),
    )
}

/// Tops the roster up with bots and opens spawn selection.
pub async fn start_handler(
    State(app_state): State<AppState>,
    request: Option<Json<StartRequest>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let mut game = app_state.game.lock();
    if game.state().meta.phase == MatchPhase::Waiting {
        game.fill_with_bots(request.bots.unwrap_or(app_state.default_bot_fill));
    }
    match game.start() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "phase": game.state().meta.phase,
                "contestants": game.state().contestants.len(),
                "width": game.state().map.width(),
                "height": game.state().map.height(),
            })),
        ),
        Err(err) => {
            tracing::warn!("start rejected: {err}");
            (
                StatusCode::CONFLICT,
                Json(serde_json::json!({"error": err.to_string()})),
            )
        }
    }
}

/// Queues a command for the next tick. Validation happens inside the tick.
pub async fn command_handler(
    State(app_state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let tick = app_state.current_tick.load(Ordering::Relaxed);
    app_state
        .commands
        .push(request.contestant, tick, request.command);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"queued_at_tick": tick})),
    )
}

pub async fn leave_handler(
    State(app_state): State<AppState>,
    Json(request): Json<LeaveRequest>,
) -> Json<serde_json::Value> {
    app_state.game.lock().player_disconnected(&request.contestant);
    Json(serde_json::json!({"left": request.contestant}))
}

/// Per-contestant SSE feed: `snapshot` events for the caller's own view,
/// `notice` events for match-wide phase changes.
pub async fn stream_handler(
    State(app_state): State<AppState>,
    Path(contestant): Path<String>,
) -> Response {
    let contestant = ContestantId(contestant);
    {
        let mut game = app_state.game.lock();
        if !game.state().contestants.iter().any(|c| c.id == contestant) {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": format!("unknown contestant {contestant}")})),
            )
                .into_response();
        }
        game.player_reconnected(&contestant);
    }

    let mut snapshots = app_state.hub.subscribe(&contestant);
    let mut notices = app_state.hub.subscribe_notices();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                result = snapshots.recv() => {
                    match result {
                        Ok(snapshot) => {
                            let data = serde_json::to_string(&*snapshot).unwrap_or_default();
                            yield Ok::<Event, Infallible>(Event::default().event("snapshot").data(data));
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(contestant = %contestant, skipped, "snapshot stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                result = notices.recv() => {
                    match result {
                        Ok(notice) => {
                            let data = serde_json::to_string(&notice).unwrap_or_default();
                            yield Ok(Event::default().event("notice").data(data));
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    };

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("ping"),
        )
        .into_response()
}
