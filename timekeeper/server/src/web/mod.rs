use axum::Router;
use axum::extract::MatchedPath;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use std::iter::once;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthState;
use crate::config::{self, Config};
use crate::task::TaskState;
use crate::timer::TimerState;

pub mod api;

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let app = create_app(&config, Arc::new(db));
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full application router on top of an open database connection.
pub fn create_app(config: &Config, db: Arc<DatabaseConnection>) -> Router {
    let auth_state = Arc::new(AuthState::from_config(config, db.clone()));
    let task_state = Arc::new(TaskState { db: db.clone() });
    let timer_state = Arc::new(TimerState { db });

    let api_router = api::create_api_router(auth_state, task_state, timer_state);

    Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .merge(api_router)
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new(once(AUTHORIZATION)))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan))
                .layer(cors_layer(config)),
        )
}

/// CORS for browser clients. Tokens travel in the `Authorization` header, never
/// in cookies, so credentials stay disabled.
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match config.cors_allowed_origins.as_deref() {
        None => layer.allow_origin(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(origins))
        }
    }
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

/// Custom span maker that flags credential-carrying routes.
/// Spans never include headers or bodies.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        if uri.path().starts_with("/api/v1/auth/") {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
                sensitive_route = true,
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
            )
        }
    }
}
