use axum::{extract::State, http::StatusCode, Json};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::{User, UserResponse};
use crate::services::AppError;
use crate::utils::{hash_password, verify_password};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    payload.validate()?;

    let password_hash = hash_password(&payload.password)?;
    let now = DateTime::now();
    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        password_hash,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_user(user.clone()).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user.sanitized())))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // Same response for unknown email and bad password.
    let user = state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid email or password")))?;

    verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid email or password")))?;

    let access_token = state
        .jwt
        .generate_access_token(&user.id.to_string(), &user.email)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
        user: user.sanitized(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let claims = user.0;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid subject claim")))?;

    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user.sanitized()))
}
