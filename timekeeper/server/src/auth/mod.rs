use crate::config::Config;
use crate::entities::*;
use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use jsonwebtoken::encode;
use sea_orm::*;
use std::sync::Arc;

pub mod api;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(id: i32, username: String) -> Self {
        Self { id, username }
    }
}

/// Authentication state containing the user store and JWT settings.
#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AuthState {
    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config, db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: chrono::Duration::minutes(config.token_ttl_minutes),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Claims {
    pub exp: usize,       // Expiry time of the token
    pub iat: usize,       // Issued at time of the token
    pub user_id: i32,     // ID of the authenticated user
    pub username: String, // Username of the authenticated user
}

pub async fn encode_jwt(
    user_id: i32,
    username: String,
    jwt_secret: &str,
    ttl: chrono::Duration,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let exp = (now + ttl).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        exp,
        iat,
        user_id,
        username,
    };
    let jwt = encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub async fn decode_jwt(token: &str, jwt_secret: &str) -> anyhow::Result<Claims> {
    let token_data = jsonwebtoken::decode(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Hashes a plain password with argon2id into a PHC string.
pub fn hash_password(password: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserServiceError::PasswordHash(e.to_string()))
}

/// Verifies a plain password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// Argon2 runs on the blocking pool.
async fn hash_password_blocking(password: String) -> Result<String, UserServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| UserServiceError::PasswordHash(e.to_string()))?
}

async fn verify_password_blocking(
    password: String,
    hash: String,
) -> Result<bool, UserServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| UserServiceError::PasswordHash(e.to_string()))
}

#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct User {
    id: i32,
    username: String,
    email: String,
}

impl User {
    pub fn new(id: i32, username: String, email: String) -> Self {
        Self {
            id,
            username,
            email,
        }
    }

    /// Returns the ID of the user.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::new(model.id, model.username, model.email)
    }
}

/// Error type for UserService operations.
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("User already exists with that email or username")]
    UserAlreadyExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub struct UserService<'a> {
    db: &'a DatabaseConnection,
}

impl UserService<'_> {
    pub fn new(db: &DatabaseConnection) -> UserService<'_> {
        UserService { db }
    }

    /// Registers a new user with a hashed password.
    ///
    /// # Arguments
    ///
    /// * `username` - Unique display name.
    /// * `email` - Unique login email.
    /// * `password` - Plain password, stored only as an argon2id hash.
    ///
    /// # Returns
    ///
    /// The created `User`, or `UserAlreadyExists` when the username or email is taken.
    #[tracing::instrument(skip(self, password))]
    pub async fn register_user(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<User, UserServiceError> {
        let username = username.trim().to_string();
        let email = email.trim().to_lowercase();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(UserServiceError::Validation(
                "Username, email and password are required".to_string(),
            ));
        }

        if self.user_exists(&username, &email).await? {
            return Err(UserServiceError::UserAlreadyExists);
        }

        let active_model = user::ActiveModel {
            username: ActiveValue::Set(username),
            email: ActiveValue::Set(email),
            password_hash: ActiveValue::Set(hash_password_blocking(password).await?),
            created_at: ActiveValue::Set(chrono::Utc::now()),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await.map_err(|err| {
            // A concurrent registration can still hit the unique indexes.
            match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => UserServiceError::UserAlreadyExists,
                _ => UserServiceError::Database(err),
            }
        })?;
        tracing::info!("Registered user {}", created_model.id);
        Ok(User::from(created_model))
    }

    /// Checks an email/password pair and returns the matching user.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        let email = email.trim().to_lowercase();
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db)
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let password_hash = found.password_hash.clone();
        if !verify_password_blocking(password.to_string(), password_hash).await? {
            tracing::warn!("Rejected login for user {}", found.id);
            return Err(UserServiceError::InvalidCredentials);
        }
        Ok(User::from(found))
    }

    /// Looks up a user by ID.
    #[tracing::instrument(skip(self))]
    pub async fn find_user(&self, id: i32) -> Result<Option<User>, UserServiceError> {
        let found = user::Entity::find_by_id(id).one(self.db).await?;
        Ok(found.map(User::from))
    }

    #[tracing::instrument(skip(self))]
    async fn user_exists(&self, username: &str, email: &str) -> Result<bool, UserServiceError> {
        let existing = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(username))
                    .add(user::Column::Email.eq(email)),
            )
            .one(self.db)
            .await?;
        Ok(existing.is_some())
    }
}
