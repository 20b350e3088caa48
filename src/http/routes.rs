//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::warn;

use crate::app::AppState;
use crate::commands::CommandError;
use crate::game::session::{Privilege, SessionId, TeamSide};
use crate::game::{GameEvent, MatchError, MatchStatus};
use crate::http::middleware::require_admin;
use crate::script::Verdict;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Upper bound on any engine request, including the match loop round trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Engine routes (admin token required)
    let engine_routes = Router::new()
        .route("/status", get(status_handler))
        .route("/sessions", post(join_handler))
        .route("/sessions/:id", delete(leave_handler))
        .route("/sessions/:id/privilege", post(privilege_handler))
        .route("/events", post(event_handler))
        .route("/commands", post(command_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(engine_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(state)
}

// ============================================================================
// Health and status
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
    })
}

async fn status_handler(State(state): State<AppState>) -> Result<Json<MatchStatus>, AppError> {
    Ok(Json(state.match_handle.status().await?))
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Deserialize)]
struct JoinRequest {
    id: SessionId,
    name: String,
    team: TeamSide,
    #[serde(default)]
    privilege: Privilege,
}

async fn join_handler(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> Result<StatusCode, AppError> {
    state
        .match_handle
        .join(req.id, req.name, req.team, req.privilege)
        .await?;
    Ok(StatusCode::CREATED)
}

async fn leave_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, AppError> {
    state.match_handle.leave(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct PrivilegeRequest {
    privilege: Privilege,
}

async fn privilege_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<PrivilegeRequest>,
) -> Result<StatusCode, AppError> {
    state.match_handle.set_privilege(id, req.privilege).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Events and commands
// ============================================================================

#[derive(Deserialize)]
struct EventRequest {
    session: SessionId,
    #[serde(flatten)]
    event: GameEvent,
}

#[derive(Serialize)]
struct EventResponse {
    verdict: Verdict,
}

async fn event_handler(
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    let verdict = state.match_handle.event(req.session, req.event).await?;
    Ok(Json(EventResponse { verdict }))
}

#[derive(Deserialize)]
struct CommandRequest {
    session: SessionId,
    /// Chat line, e.g. `/timer 5`
    command: String,
}

#[derive(Serialize)]
struct CommandResponse {
    message: Option<String>,
}

async fn command_handler(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    if !state.command_limiter.check() {
        warn!(session = req.session, "Rate limited command");
        return Err(AppError::RateLimited);
    }

    let message = state
        .match_handle
        .command(req.session, req.command)
        .await?;
    Ok(Json(CommandResponse { message }))
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

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        let message = err.to_string();
        match err {
            MatchError::UnknownSession(_) => AppError::NotFound(message),
            MatchError::DuplicateSession(_) => AppError::Conflict(message),
            MatchError::EmptyCommand => AppError::BadRequest(message),
            MatchError::Command(CommandError::NotFound(_)) => AppError::NotFound(message),
            MatchError::Command(CommandError::PermissionDenied(_)) => AppError::Forbidden(message),
            MatchError::Command(_) => AppError::BadRequest(message),
            MatchError::Hook(_) | MatchError::Closed => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
