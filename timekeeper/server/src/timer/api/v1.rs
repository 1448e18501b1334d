use crate::auth::CurrentUser;
use crate::timer::{TimeRecord, TimerService, TimerServiceError, TimerState};
use crate::web::api::{ErrorResponse, api_error};
use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON representation of a TimeRecord for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecordJson {
    pub id: i32,
    pub task_id: i32,
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed minutes, fractional; null while the record is active
    pub duration: Option<f64>,
    pub is_active: bool,
}

impl From<TimeRecord> for TimeRecordJson {
    fn from(record: TimeRecord) -> Self {
        Self {
            id: record.id,
            task_id: record.task_id,
            user_id: record.user_id,
            start_time: record.start_time,
            end_time: record.end_time,
            duration: record.duration,
            is_active: record.is_active,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerRequest {
    pub task_id: i32,
}

/// Body of a resume request. Without `taskId` the task of the path record is used.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResumeTimerRequest {
    #[serde(default)]
    pub task_id: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecordsQuery {
    pub task_id: i32,
}

fn error_response(err: TimerServiceError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        TimerServiceError::TaskNotFound(_) => api_error(StatusCode::NOT_FOUND, "Task not found"),
        TimerServiceError::ActiveRecordNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "Active time record not found")
        }
        TimerServiceError::RecordNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "Time record not found")
        }
        TimerServiceError::TimerAlreadyRunning(_) => api_error(
            StatusCode::CONFLICT,
            "A timer is already running for this task",
        ),
        TimerServiceError::Database(db_err) => {
            tracing::error!("Time record store error: {}", db_err);
            api_error(StatusCode::BAD_REQUEST, db_err.to_string())
        }
    }
}

/// Handler for POST /api/v1/time-records/start
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/v1/time-records/start",
    request_body = StartTimerRequest,
    responses(
        (status = 201, description = "Timer started", body = TimeRecordJson),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 409, description = "A timer is already running for the task", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Time records"
)]
pub async fn start_timer_handler(
    State(state): State<Arc<TimerState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<StartTimerRequest>,
) -> Result<(StatusCode, Json<TimeRecordJson>), (StatusCode, Json<ErrorResponse>)> {
    let record = TimerService::new(&state.db)
        .start_timer(payload.task_id, current_user.id)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(TimeRecordJson::from(record))))
}

/// Handler for POST /api/v1/time-records/{id}/pause
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/v1/time-records/{id}/pause",
    params(("id" = i32, Path, description = "Active time record ID")),
    responses(
        (status = 200, description = "Timer paused", body = TimeRecordJson),
        (status = 404, description = "Active time record not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Time records"
)]
pub async fn pause_timer_handler(
    State(state): State<Arc<TimerState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<TimeRecordJson>, (StatusCode, Json<ErrorResponse>)> {
    let record = TimerService::new(&state.db)
        .pause_timer(id, current_user.id)
        .await
        .map_err(error_response)?;
    Ok(Json(TimeRecordJson::from(record)))
}

/// Handler for POST /api/v1/time-records/{id}/resume
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/v1/time-records/{id}/resume",
    params(("id" = i32, Path, description = "ID of the paused time record")),
    request_body = ResumeTimerRequest,
    responses(
        (status = 201, description = "Timer resumed with a new record", body = TimeRecordJson),
        (status = 404, description = "Task or time record not found", body = ErrorResponse),
        (status = 409, description = "A timer is already running for the task", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Time records"
)]
pub async fn resume_timer_handler(
    State(state): State<Arc<TimerState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    payload: Option<Json<ResumeTimerRequest>>,
) -> Result<(StatusCode, Json<TimeRecordJson>), (StatusCode, Json<ErrorResponse>)> {
    let service = TimerService::new(&state.db);
    let task_id = match payload.and_then(|Json(body)| body.task_id) {
        Some(task_id) => task_id,
        None => service
            .task_of_record(id, current_user.id)
            .await
            .map_err(error_response)?,
    };

    let record = service
        .resume_timer(task_id, current_user.id)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(TimeRecordJson::from(record))))
}

/// Handler for POST /api/v1/time-records/{id}/stop
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/v1/time-records/{id}/stop",
    params(("id" = i32, Path, description = "Active time record ID")),
    responses(
        (status = 200, description = "Timer stopped", body = TimeRecordJson),
        (status = 404, description = "Active time record not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Time records"
)]
pub async fn stop_timer_handler(
    State(state): State<Arc<TimerState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<TimeRecordJson>, (StatusCode, Json<ErrorResponse>)> {
    let record = TimerService::new(&state.db)
        .stop_timer(id, current_user.id)
        .await
        .map_err(error_response)?;
    Ok(Json(TimeRecordJson::from(record)))
}

/// Handler for GET /api/v1/time-records?taskId=
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/time-records",
    params(("taskId" = i32, Query, description = "Task whose records to list")),
    responses(
        (status = 200, description = "Records of the task, oldest first", body = [TimeRecordJson])
    ),
    security(("bearer" = [])),
    tag = "Time records"
)]
pub async fn list_time_records_handler(
    State(state): State<Arc<TimerState>>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<TimeRecordsQuery>,
) -> Result<Json<Vec<TimeRecordJson>>, (StatusCode, Json<ErrorResponse>)> {
    let records = TimerService::new(&state.db)
        .records_for_task(query.task_id, current_user.id)
        .await
        .map_err(error_response)?;
    Ok(Json(records.into_iter().map(TimeRecordJson::from).collect()))
}

/// Creates and returns the time records API router.
pub fn create_api_router(state: Arc<TimerState>) -> Router {
    Router::new()
        .route("/time-records", get(list_time_records_handler))
        .route("/time-records/start", post(start_timer_handler))
        .route("/time-records/{id}/pause", post(pause_timer_handler))
        .route("/time-records/{id}/resume", post(resume_timer_handler))
        .route("/time-records/{id}/stop", post(stop_timer_handler))
        .with_state(state)
}
