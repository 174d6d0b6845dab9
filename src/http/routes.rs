//! HTTP route definitions

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::matchmaking::{RoomError, RoomRole};
use crate::sim::SessionMode;
use crate::store::{LeaderboardEntry, NewLeaderboardEntry, RaceResultStore, StoreError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{RoomEntrant, RoomState};

const MAX_ID_LEN: usize = 64;
const MAX_DISPLAY_NAME_LEN: usize = 32;
const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Empty CLIENT_ORIGIN means any origin
    let origins: Vec<HeaderValue> = state
        .config
        .client_origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/rooms/join", post(join_room_handler))
        .route(
            "/leaderboard",
            get(leaderboard_handler).post(submit_leaderboard_handler),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    open_rooms: usize,
    waiting_rooms: usize,
    live_channels: usize,
    result_store: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        open_rooms: state.rooms.open_rooms(),
        waiting_rooms: state.rooms.waiting_count(),
        live_channels: state.rooms.live_channels(),
        result_store: state.results.backend(),
    })
}

// ============================================================================
// Room endpoints
// ============================================================================

#[derive(Deserialize)]
struct JoinRoomRequest {
    player_id: String,
    display_name: String,
    #[serde(default)]
    cosmetic: Option<String>,
}

#[derive(Serialize)]
struct JoinRoomResponse {
    room_id: Uuid,
    role: RoomRole,
    room: RoomState,
    /// Relay socket for this room
    ws_path: String,
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn join_room_handler(
    State(state): State<AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    if state.join_limiter.check().is_err() {
        return Err(AppError::TooManyRequests);
    }
    if !is_plain_id(&req.player_id) {
        return Err(AppError::BadRequest("invalid player_id".to_string()));
    }
    let display_name = req.display_name.trim();
    if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "display_name must be 1-{MAX_DISPLAY_NAME_LEN} characters"
        )));
    }

    let entrant = RoomEntrant {
        player_id: req.player_id.clone(),
        display_name: display_name.to_string(),
        cosmetic: req.cosmetic,
    };
    let (room, role) = state.rooms.join_or_create(entrant);

    info!(room_id = %room.room_id, player_id = %req.player_id, ?role, "Player placed in room");

    Ok(Json(JoinRoomResponse {
        room_id: room.room_id,
        role,
        ws_path: format!("/ws?room_id={}&player_id={}", room.room_id, req.player_id),
        room,
    }))
}

// ============================================================================
// Leaderboard endpoints
// ============================================================================

#[derive(Deserialize)]
struct LeaderboardQuery {
    mode: Option<SessionMode>,
    limit: Option<usize>,
}

async fn leaderboard_handler(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let entries = state
        .results
        .top_entries(
            query.mode.unwrap_or(SessionMode::Solo),
            query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT),
        )
        .await?;
    Ok(Json(entries))
}

async fn submit_leaderboard_handler(
    State(state): State<AppState>,
    Json(entry): Json<NewLeaderboardEntry>,
) -> Result<(StatusCode, Json<LeaderboardEntry>), AppError> {
    let stored = state.results.submit_leaderboard_entry(entry).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RoomError> for AppError {
    fn from(e: RoomError) -> Self {
        match e {
            RoomError::NotFound(_) => AppError::NotFound(e.to_string()),
            RoomError::Full(_) | RoomError::Closed(_) | RoomError::AlreadyInRoom(_) => {
                AppError::Conflict(e.to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(msg) => AppError::BadRequest(msg),
            other => {
                error!(error = %other, "Result store failure");
                AppError::Internal("result store unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
