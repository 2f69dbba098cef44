/// Routes behind the JWT middleware
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::generate_token_hash;
use crate::domain::User;
use crate::error::{AppError, AuthError, ErrorContext, StorageError};
use crate::middleware::AuthenticatedUser;
use crate::startup::AppState;
use crate::validators::is_valid_username;

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
}

async fn load_user(state: &AppState, user: &AuthenticatedUser) -> Result<User, AppError> {
    let id = Uuid::parse_str(&user.0).map_err(|_| AuthError::InvalidToken)?;
    state
        .repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| StorageError::NotFound("user".to_string()).into())
}

/// GET /api/me
pub async fn current_user(
    user: web::ReqData<AuthenticatedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = load_user(&state, &user).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// PUT /api/me
pub async fn update_current_user(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<UpdateUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("update_current_user");

    let mut user = load_user(&state, &user).await?;
    user.username = is_valid_username(&form.username)?;
    user.updated_at = Utc::now();
    state.repository.update(&user).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %user.id,
        "Username updated"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// POST /api/logout
///
/// Rotates the token hash. Every refresh token of the user is revoked;
/// access tokens already issued stay valid until they expire.
pub async fn logout(
    user: web::ReqData<AuthenticatedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("logout");

    let user = load_user(&state, &user).await?;
    state
        .repository
        .rotate_token_hash(user.id, &generate_token_hash())
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %user.id,
        "User logged out"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Logged out successfully"
    })))
}
