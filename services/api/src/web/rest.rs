//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    Difficulty, Direction, DueWordsRequest, DueWordsResponse, RecordReviewRequest,
    ResetProgressResponse, RetrySyncResponse, SessionResponse, StartSessionRequest,
    StatsResponse, SyncStatusResponse, WordProgressResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;
use uuid::Uuid;
use vocab_progress_core::domain::ReviewOutcome;
use vocab_progress_core::ports::PortError;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        record_review_handler,
        stats_handler,
        word_progress_handler,
        due_words_handler,
        reset_progress_handler,
        start_session_handler,
        end_session_handler,
        current_session_handler,
        sync_status_handler,
        retry_sync_handler,
        sign_out_handler,
    ),
    components(
        schemas(
            Difficulty,
            Direction,
            RecordReviewRequest,
            DueWordsRequest,
            StartSessionRequest,
            WordProgressResponse,
            StatsResponse,
            DueWordsResponse,
            SessionResponse,
            SyncStatusResponse,
            RetrySyncResponse,
            ResetProgressResponse,
        )
    ),
    tags(
        (name = "Vocabulary Progress API", description = "Spaced-repetition progress tracking with offline-tolerant persistence.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

fn port_error_response(context: &str, e: PortError) -> HandlerError {
    let status = match e {
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("{}: {:?}", context, e);
    (status, format!("{}: {}", context, e))
}

//=========================================================================================
// Progress Handlers
//=========================================================================================

/// Record the learner's answer to one word.
///
/// The local state is updated immediately; persistence falls back to the offline
/// queue when the store is unreachable.
#[utoipa::path(
    post,
    path = "/progress/reviews",
    request_body = RecordReviewRequest,
    responses(
        (status = 200, description = "Updated progress of the word", body = WordProgressResponse),
        (status = 401, description = "Missing or invalid x-user-id header")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn record_review_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<RecordReviewRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let coordinator = app_state.coordinator_for(user_id).await;
    let progress = coordinator
        .record_outcome(ReviewOutcome::from(req))
        .map_err(|e| port_error_response("Failed to record review", e))?;
    Ok(Json(WordProgressResponse::from(progress)))
}

/// Aggregate statistics computed from the local progress.
#[utoipa::path(
    get,
    path = "/progress/stats",
    responses(
        (status = 200, description = "Progress statistics", body = StatsResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<StatsResponse> {
    let coordinator = app_state.coordinator_for(user_id).await;
    Json(coordinator.get_stats().into())
}

/// Progress of a single word.
#[utoipa::path(
    get,
    path = "/progress/words/{word_id}",
    responses(
        (status = 200, description = "Progress of the word", body = WordProgressResponse),
        (status = 404, description = "The word was never reviewed")
    ),
    params(
        ("word_id" = i64, Path, description = "The word identifier."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn word_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(word_id): Path<i64>,
) -> Result<Json<WordProgressResponse>, HandlerError> {
    let coordinator = app_state.coordinator_for(user_id).await;
    coordinator
        .progress(word_id)
        .map(|p| Json(p.into()))
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No progress for word {}", word_id)))
}

/// Filter candidate words down to the due ones, in study priority order.
#[utoipa::path(
    post,
    path = "/progress/due",
    request_body = DueWordsRequest,
    responses(
        (status = 200, description = "Due words, highest priority first", body = DueWordsResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn due_words_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<DueWordsRequest>,
) -> Json<DueWordsResponse> {
    let coordinator = app_state.coordinator_for(user_id).await;
    Json(DueWordsResponse {
        due: coordinator.get_due_words(&req.candidate_ids),
    })
}

/// Delete all progress of the user, locally and in the store.
#[utoipa::path(
    delete,
    path = "/progress",
    responses(
        (status = 200, description = "Progress deleted", body = ResetProgressResponse),
        (status = 503, description = "The store is unreachable")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn reset_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<ResetProgressResponse>, HandlerError> {
    let coordinator = app_state.coordinator_for(user_id).await;
    let deleted = coordinator
        .reset_progress()
        .await
        .map_err(|e| port_error_response("Failed to reset progress", e))?;
    Ok(Json(ResetProgressResponse { deleted }))
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Start a learning session, replacing any session still open.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn start_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let coordinator = app_state.coordinator_for(user_id).await;
    let session = coordinator
        .start_session(req.direction.into())
        .await
        .map_err(|e| port_error_response("Failed to start session", e))?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// End the open session and persist its aggregate counts.
#[utoipa::path(
    post,
    path = "/sessions/end",
    responses(
        (status = 200, description = "Final session aggregate", body = SessionResponse),
        (status = 404, description = "No session is open")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn end_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<SessionResponse>, HandlerError> {
    let coordinator = app_state.coordinator_for(user_id).await;
    coordinator
        .end_session()
        .map(|s| Json(s.into()))
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No open session".to_string()))
}

/// The session currently open, with its running counts.
#[utoipa::path(
    get,
    path = "/sessions/current",
    responses(
        (status = 200, description = "The open session", body = SessionResponse),
        (status = 404, description = "No session is open")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn current_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<SessionResponse>, HandlerError> {
    let coordinator = app_state.coordinator_for(user_id).await;
    coordinator
        .current_session()
        .map(|s| Json(s.into()))
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No open session".to_string()))
}

//=========================================================================================
// Sync Handlers
//=========================================================================================

/// Connectivity and offline-queue status for user-facing messaging.
#[utoipa::path(
    get,
    path = "/sync/status",
    responses(
        (status = 200, description = "Current sync status", body = SyncStatusResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn sync_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<SyncStatusResponse> {
    let coordinator = app_state.coordinator_for(user_id).await;
    Json(coordinator.sync_status().into())
}

/// Manually retry delivering the queued writes.
#[utoipa::path(
    post,
    path = "/sync/retry",
    responses(
        (status = 200, description = "Outcome of the flush", body = RetrySyncResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn retry_sync_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<RetrySyncResponse> {
    let coordinator = app_state.coordinator_for(user_id).await;
    let report = coordinator.retry_sync().await;
    Json(RetrySyncResponse::new(report, coordinator.pending_writes()))
}

/// Release everything held in memory for the user.
#[utoipa::path(
    post,
    path = "/sign-out",
    responses(
        (status = 204, description = "Signed out"),
        (status = 404, description = "Nothing was held for the user")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn sign_out_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> StatusCode {
    if app_state.sign_out(user_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
