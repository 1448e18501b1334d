use crate::auth::CurrentUser;
use crate::entities::sea_orm_active_enums::{TaskPriority, TaskStatus};
use crate::task::{NewTask, Task, TaskService, TaskServiceError, TaskState, TaskUpdate};
use crate::web::api::{ErrorResponse, api_error};
use axum::{
    Extension, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON representation of a Task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Estimated effort in minutes
    pub estimated_time: Option<i32>,
    /// Minutes accumulated by stopped timers
    pub actual_time: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskJson {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            estimated_time: task.estimated_time,
            actual_time: task.actual_time,
            due_date: task.due_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub estimated_time: Option<i32>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(request: CreateTaskRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            priority: request.priority,
            estimated_time: request.estimated_time,
            due_date: request.due_date,
        }
    }
}

/// Partial task update. Unknown fields such as `actualTime` are ignored.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub estimated_time: Option<i32>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl From<UpdateTaskRequest> for TaskUpdate {
    fn from(request: UpdateTaskRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            status: request.status,
            priority: request.priority,
            estimated_time: request.estimated_time,
            due_date: request.due_date,
        }
    }
}

fn error_response(err: TaskServiceError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        TaskServiceError::TaskNotFound(_) => api_error(StatusCode::NOT_FOUND, "Task not found"),
        TaskServiceError::Validation(message) => api_error(StatusCode::BAD_REQUEST, message),
        TaskServiceError::Database(db_err) => {
            tracing::error!("Task store error: {}", db_err);
            api_error(StatusCode::BAD_REQUEST, db_err.to_string())
        }
    }
}

/// Handler for POST /api/v1/tasks
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskJson),
        (status = 400, description = "Invalid task", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskJson>), (StatusCode, Json<ErrorResponse>)> {
    let task = TaskService::new(&state.db)
        .create_task(current_user.id, NewTask::from(payload))
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(TaskJson::from(task))))
}

/// Handler for GET /api/v1/tasks
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    responses(
        (status = 200, description = "Tasks of the current user", body = [TaskJson]),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Vec<TaskJson>>, (StatusCode, Json<ErrorResponse>)> {
    let tasks = TaskService::new(&state.db)
        .list_tasks(current_user.id)
        .await
        .map_err(error_response)?;
    Ok(Json(tasks.into_iter().map(TaskJson::from).collect()))
}

/// Handler for GET /api/v1/tasks/{id}
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 200, description = "The task", body = TaskJson),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn get_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<TaskJson>, (StatusCode, Json<ErrorResponse>)> {
    let task = TaskService::new(&state.db)
        .get_task(id, current_user.id)
        .await
        .map_err(error_response)?;
    Ok(Json(TaskJson::from(task)))
}

/// Handler for PUT /api/v1/tasks/{id}
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}",
    params(("id" = i32, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskJson),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskJson>, (StatusCode, Json<ErrorResponse>)> {
    let task = TaskService::new(&state.db)
        .update_task(id, current_user.id, TaskUpdate::from(payload))
        .await
        .map_err(error_response)?;
    Ok(Json(TaskJson::from(task)))
}

/// Handler for DELETE /api/v1/tasks/{id}
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    TaskService::new(&state.db)
        .delete_task(id, current_user.id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/tasks/{id}",
            get(get_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .with_state(state)
}
