#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use timekeeper_server::auth::{User, UserService, encode_jwt};
use timekeeper_server::config::Config;
use timekeeper_server::task::{NewTask, Task, TaskService};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test_secret";

/// Opens a fresh in-memory database with all migrations applied.
///
/// The pool is pinned to a single connection because every SQLite
/// in-memory connection is its own database.
pub async fn setup_db() -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// A database file behind a pool of several connections, so transactions
/// issued concurrently really overlap.
pub struct SharedDb {
    pub db: DatabaseConnection,
    _dir: tempfile::TempDir,
}

pub async fn setup_shared_db() -> anyhow::Result<SharedDb> {
    let dir = tempfile::tempdir()?;
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("timekeeper.db").display()
    );
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(4)
        .min_connections(4)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(SharedDb { db, _dir: dir })
}

pub fn test_config() -> Config {
    Config {
        db_url: "sqlite::memory:".to_string(),
        port: 8080,
        jwt_secret: JWT_SECRET.to_string(),
        token_ttl_minutes: 60,
        cors_allowed_origins: None,
    }
}

pub async fn create_user(db: &DatabaseConnection, username: &str) -> User {
    UserService::new(db)
        .register_user(
            username.to_string(),
            format!("{}@example.com", username),
            "password123".to_string(),
        )
        .await
        .unwrap()
}

pub async fn create_task(db: &DatabaseConnection, user: &User, title: &str) -> Task {
    TaskService::new(db)
        .create_task(
            user.id(),
            NewTask {
                title: title.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

pub async fn token_for(user: &User) -> String {
    encode_jwt(
        user.id(),
        user.username().to_string(),
        JWT_SECRET,
        chrono::Duration::minutes(5),
    )
    .await
    .unwrap()
}

/// Builds the full application on top of `db`.
pub fn create_test_app(db: DatabaseConnection) -> Router {
    timekeeper_server::web::create_app(&test_config(), Arc::new(db))
}

/// Sends one request through `app` and returns the status with the raw body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

pub fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap()
}
