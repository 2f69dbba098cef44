/// Authentication Routes
///
/// Signup, login and access-token refresh.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{authenticate, custom_key_matches, hash_password};
use crate::domain::User;
use crate::error::{AppError, AuthError, ErrorContext};
use crate::startup::AppState;
use crate::validators::{is_valid_email, is_valid_username};
use crate::verification::{VerificationEntry, VerificationType};

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login response with access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// bcrypt is deliberately slow, keep it off the async workers
pub(crate) async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    web::block(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn authenticate_blocking(password: String, stored_hash: String) -> Result<bool, AppError> {
    web::block(move || authenticate(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))
}

/// POST /auth/signup
///
/// Creates an unverified user and mails a verification code.
///
/// # Errors
/// - 400: Invalid email, username or weak password
/// - 409: Email already registered
/// - 503: Mail service unavailable
pub async fn signup(
    form: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("signup");

    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;
    let password_hash = hash_password_blocking(form.password.clone()).await?;

    let user = User::new(email, password_hash, username);
    state.repository.create(&user).await?;

    let entry = VerificationEntry::issue(
        &user.email,
        VerificationType::MainVerification,
        &state.verification,
    );
    state.repository.upsert_verification_entry(&entry).await?;
    state.email_client.send_verification_code(&entry).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %user.id,
        "User signed up"
    );

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Account created, please check your email to verify your account",
        "user_id": user.id.to_string(),
    })))
}

/// POST /auth/login
///
/// Same response for an unknown email and a wrong password.
///
/// # Errors
/// - 400: Malformed email
/// - 401: Invalid credentials
/// - 403: Email not verified yet
pub async fn login(
    form: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("login");

    let email = is_valid_email(&form.email)?;
    let user = state
        .repository
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !authenticate_blocking(form.password.clone(), user.password_hash.clone()).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    if !user.is_verified {
        return Err(AuthError::AccountNotVerified.into());
    }

    let user_id = user.id.to_string();
    let access_token = state.tokens.issue_access_token(&user_id)?;
    let refresh_token = state.tokens.issue_refresh_token(&user_id, &user.token_hash)?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %user.id,
        "User logged in"
    );

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_token_lifetime().num_seconds(),
    }))
}

/// POST /auth/refresh
///
/// Issues a new access token. The refresh token's custom key must still match
/// the user's current token hash; logout and password changes rotate it.
///
/// # Errors
/// - 401: Invalid, forged or revoked refresh token
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (user_id, custom_key) = state.tokens.validate_refresh_token(&form.refresh_token)?;
    let context = ErrorContext::new("refresh");

    let id = Uuid::parse_str(&user_id).map_err(|_| AuthError::InvalidToken)?;
    let user = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    if !custom_key_matches(&custom_key, &user_id, &user.token_hash) {
        tracing::warn!(
            request_id = %context.request_id,
            operation = %context.operation,
            user_id = %user_id,
            "Refresh token was revoked by token hash rotation"
        );
        return Err(AuthError::InvalidToken.into());
    }

    let access_token = state.tokens.issue_access_token(&user_id)?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %user_id,
        "Access token refreshed"
    );

    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_token_lifetime().num_seconds(),
    }))
}
