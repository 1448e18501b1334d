use std::sync::Arc;

use crate::{
    auth::{self, AuthState},
    task::{self, TaskState},
    timer::{self, TimerState},
};

use axum::{
    Json, Router,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// JSON body returned for every API error.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Builds the `(status, body)` pair handlers return on failure.
pub fn api_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse::new(message)))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::api::v1::json_register_handler,
        auth::api::v1::json_login_handler,
        auth::api::v1::json_current_user_handler,
        auth::api::v1::json_logout_handler,
        task::api::v1::create_task_handler,
        task::api::v1::list_tasks_handler,
        task::api::v1::get_task_handler,
        task::api::v1::update_task_handler,
        task::api::v1::delete_task_handler,
        timer::api::v1::list_time_records_handler,
        timer::api::v1::start_timer_handler,
        timer::api::v1::pause_timer_handler,
        timer::api::v1::resume_timer_handler,
        timer::api::v1::stop_timer_handler,
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Tasks", description = "Task management"),
        (name = "Time records", description = "Start, pause, resume and stop timers")
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(
    auth_state: Arc<AuthState>,
    task_state: Arc<TaskState>,
    timer_state: Arc<TimerState>,
) -> axum::Router {
    let login_router = auth::api::v1::create_api_router(auth_state.clone());
    let account_router = auth::api::v1::create_protected_api_router(auth_state.clone());
    let tasks_router = task::api::v1::create_api_router(task_state);
    let timer_router = timer::api::v1::create_api_router(timer_state);
    let protected_routes = account_router
        .merge(tasks_router)
        .merge(timer_router)
        .layer(ServiceBuilder::new().layer(from_fn(auth::api::v1::require_auth_middleware)));
    let public_routes = login_router;
    let api_routes = public_routes.merge(protected_routes);
    Router::new()
        .nest("/api/v1", api_routes)
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state,
            auth::api::v1::auth_user_middleware,
        )))
}
