use crate::auth::{
    AuthState, CurrentUser, User, UserService, UserServiceError, decode_jwt, encode_jwt,
};
use crate::web::api::{ErrorResponse, api_error};
use axum::{
    Json, Router,
    Extension,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON request payload for registration
#[derive(Deserialize, Debug, ToSchema)]
pub struct JsonRegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// JSON request payload for API login
#[derive(Deserialize, Debug, ToSchema)]
pub struct JsonLoginRequest {
    pub email: String,
    pub password: String,
}

/// JSON response carrying a human-readable outcome
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Public view of a user.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct UserJson {
    pub id: i32,
    pub username: String,
    pub email: String,
}

impl From<User> for UserJson {
    fn from(user: User) -> Self {
        Self {
            id: user.id(),
            username: user.username().to_string(),
            email: user.email().to_string(),
        }
    }
}

/// JSON response for successful API login
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserJson,
}

fn error_response(err: UserServiceError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        UserServiceError::UserAlreadyExists | UserServiceError::Validation(_) => {
            api_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        UserServiceError::InvalidCredentials => api_error(StatusCode::UNAUTHORIZED, err.to_string()),
        UserServiceError::PasswordHash(_) => {
            tracing::error!("Password hashing failed: {}", err);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process credentials",
            )
        }
        UserServiceError::Database(ref db_err) => {
            tracing::error!("User store error: {}", db_err);
            api_error(StatusCode::BAD_REQUEST, db_err.to_string())
        }
    }
}

/// Creates a JSON API router for authentication endpoints.
pub fn create_api_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route("/auth/register", post(json_register_handler))
        .route("/auth/login", post(json_login_handler))
        .with_state(state)
}

/// Creates the router for auth endpoints that need an authenticated user.
/// Must sit behind `require_auth_middleware`.
pub fn create_protected_api_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route("/auth/me", get(json_current_user_handler))
        .route("/auth/logout", post(json_logout_handler))
        .with_state(state)
}

/// API authentication middleware that extracts the current user from Authorization Bearer header.
/// Sets the CurrentUser extension if a valid JWT token is found in the Authorization header.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        if let Ok(claims) = decode_jwt(token, &state.jwt_secret).await {
            let current_user = CurrentUser::new(claims.user_id, claims.username);
            request.extensions_mut().insert(current_user);
        }
    }

    next.run(request).await
}

/// Middleware that ensures the current user is authenticated.
/// Returns UNAUTHORIZED if the CurrentUser extension is not found in the request.
/// This middleware should be applied after auth_user_middleware.
pub async fn require_auth_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return api_error(StatusCode::UNAUTHORIZED, "Authentication required").into_response();
    }

    next.run(request).await
}

/// Handles JSON registration requests.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = JsonRegisterRequest,
    responses(
        (status = 201, description = "User registered", body = MessageResponse),
        (status = 400, description = "Invalid input or user already exists", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn json_register_handler(
    State(state): State<Arc<AuthState>>,
    Json(payload): Json<JsonRegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), (StatusCode, Json<ErrorResponse>)> {
    UserService::new(&state.db)
        .register_user(payload.username, payload.email, payload.password)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

/// Handles JSON login requests and returns a JWT token.
/// Validates credentials and returns either a success response with token or an error.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = JsonLoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn json_login_handler(
    State(state): State<Arc<AuthState>>,
    Json(payload): Json<JsonLoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    let user = UserService::new(&state.db)
        .authenticate(&payload.email, &payload.password)
        .await
        .map_err(error_response)?;

    let token = encode_jwt(
        user.id(),
        user.username().to_string(),
        &state.jwt_secret,
        state.token_ttl,
    )
    .await
    .map_err(|err| {
        tracing::error!("Failed to issue token: {}", err);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate authentication token",
        )
    })?;

    Ok(Json(LoginResponse {
        token,
        user: UserJson::from(user),
    }))
}

/// Returns the profile of the authenticated user.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserJson),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Auth"
)]
pub async fn json_current_user_handler(
    State(state): State<Arc<AuthState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<UserJson>, (StatusCode, Json<ErrorResponse>)> {
    let user = UserService::new(&state.db)
        .find_user(current_user.id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(UserJson::from(user)))
}

/// Acknowledges a logout. Tokens are stateless, so the client discards its own.
#[tracing::instrument]
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Auth"
)]
pub async fn json_logout_handler(
    Extension(current_user): Extension<CurrentUser>,
) -> Json<MessageResponse> {
    tracing::info!("User {} logged out", current_user.id);
    Json(MessageResponse {
        message: "User logged out successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::{from_fn, from_fn_with_state};
    use sea_orm::Database;
    use tower::ServiceExt;

    async fn auth_state() -> Arc<AuthState> {
        // The middlewares never touch the store; any connection will do.
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Arc::new(AuthState {
            db: Arc::new(db),
            jwt_secret: "test_secret".to_string(),
            token_ttl: chrono::Duration::minutes(5),
        })
    }

    fn protected_app(state: Arc<AuthState>) -> Router {
        Router::new()
            .route(
                "/protected",
                axum::routing::get(|axum::Extension(user): axum::Extension<CurrentUser>| async move {
                    format!("{}:{}", user.id, user.username)
                }),
            )
            .layer(from_fn(require_auth_middleware))
            .layer(from_fn_with_state(state, auth_user_middleware))
    }

    #[tokio::test]
    async fn auth_middlewares_reject_missing_token() {
        let app = protected_app(auth_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, r#"{"error":"Authentication required"}"#);
    }

    #[tokio::test]
    async fn auth_middlewares_reject_garbage_token() {
        let app = protected_app(auth_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_middlewares_resolve_current_user() {
        let state = auth_state().await;
        let token = encode_jwt(7, "bob".to_string(), &state.jwt_secret, state.token_ttl)
            .await
            .unwrap();
        let app = protected_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "7:bob");
    }
}
