/// Verification Code Routes
///
/// Mail verification and password reset. Both flows store one entry per
/// (email, type); a new code replaces the old one and a successful
/// redemption consumes it before its effect is applied.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::generate_token_hash;
use crate::error::{AppError, ErrorContext, VerificationError};
use crate::routes::auth::hash_password_blocking;
use crate::startup::AppState;
use crate::validators::is_valid_email;
use crate::verification::{VerificationEntry, VerificationType};

#[derive(Deserialize)]
pub struct VerifyMailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

/// Look up the live entry or fail with `NotFound`
async fn live_entry(
    state: &AppState,
    email: &str,
    verification_type: VerificationType,
) -> Result<VerificationEntry, AppError> {
    state
        .repository
        .find_verification_entry(email, verification_type)
        .await?
        .ok_or_else(|| VerificationError::NotFound.into())
}

/// Check the supplied code; an expired entry is removed since it can never succeed
async fn redeem_entry(
    state: &AppState,
    context: &ErrorContext,
    entry: &VerificationEntry,
    supplied_code: &str,
) -> Result<(), AppError> {
    if let Err(e) = entry.redeem(supplied_code) {
        tracing::warn!(
            request_id = %context.request_id,
            operation = %context.operation,
            reason = %e,
            "Verification code rejected"
        );
        if e == VerificationError::Expired {
            // Keyed on the stale code so a freshly reissued entry survives
            state
                .repository
                .consume_verification_entry(&entry.email, entry.verification_type, &entry.code)
                .await?;
        }
        return Err(e.into());
    }
    Ok(())
}

/// Delete the redeemed entry, failing if another request already took it
async fn consume_entry(state: &AppState, entry: &VerificationEntry) -> Result<(), AppError> {
    let consumed = state
        .repository
        .consume_verification_entry(&entry.email, entry.verification_type, &entry.code)
        .await?;
    if !consumed {
        return Err(VerificationError::NotFound.into());
    }
    Ok(())
}

async fn issue_and_send(
    state: &AppState,
    email: &str,
    verification_type: VerificationType,
) -> Result<(), AppError> {
    let entry = VerificationEntry::issue(email, verification_type, &state.verification);
    state.repository.upsert_verification_entry(&entry).await?;
    state.email_client.send_verification_code(&entry).await?;
    Ok(())
}

/// POST /auth/verify/mail
///
/// # Errors
/// - 400: Code expired or does not match
/// - 404: No pending verification for this email, or the code was already used
pub async fn verify_mail(
    form: web::Json<VerifyMailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("verify_mail");
    let email = is_valid_email(&form.email)?;

    let entry = live_entry(&state, &email, VerificationType::MainVerification).await?;
    redeem_entry(&state, &context, &entry, form.code.trim()).await?;

    consume_entry(&state, &entry).await?;
    state.repository.set_verified(&email, true).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        "Email verified"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Email verified successfully"
    })))
}

/// POST /auth/verify/mail/resend
///
/// Replaces the pending mail verification code. Always answers 200 so the
/// endpoint cannot be used to probe which emails are registered.
pub async fn resend_mail_verification(
    form: web::Json<EmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("resend_mail_verification");
    let email = is_valid_email(&form.email)?;

    match state.repository.find_by_email(&email).await? {
        Some(user) if !user.is_verified => {
            issue_and_send(&state, &email, VerificationType::MainVerification).await?;
            tracing::info!(
                request_id = %context.request_id,
                operation = %context.operation,
                user_id = %user.id,
                "Mail verification code reissued"
            );
        }
        _ => {
            tracing::debug!(
                request_id = %context.request_id,
                operation = %context.operation,
                "No unverified account for email"
            );
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "If the account exists and is unverified, a new code has been sent"
    })))
}

/// POST /auth/password-reset/code
///
/// Always answers 200 for a well-formed email.
pub async fn request_password_reset(
    form: web::Json<EmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("request_password_reset");
    let email = is_valid_email(&form.email)?;

    if let Some(user) = state.repository.find_by_email(&email).await? {
        issue_and_send(&state, &email, VerificationType::PasswordReset).await?;
        tracing::info!(
            request_id = %context.request_id,
            operation = %context.operation,
            user_id = %user.id,
            "Password reset code sent"
        );
    } else {
        tracing::debug!(
            request_id = %context.request_id,
            operation = %context.operation,
            "Password reset for unknown email"
        );
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "If the account exists, a password reset code has been sent"
    })))
}

/// POST /auth/password-reset
///
/// Sets the new password and rotates the token hash, so every refresh token
/// issued before the reset stops working.
///
/// # Errors
/// - 400: Code expired or mismatched, or weak password
/// - 404: No pending reset for this email, or the code was already used
pub async fn reset_password(
    form: web::Json<ResetPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("reset_password");
    let email = is_valid_email(&form.email)?;

    let entry = live_entry(&state, &email, VerificationType::PasswordReset).await?;
    redeem_entry(&state, &context, &entry, form.code.trim()).await?;

    let user = state
        .repository
        .find_by_email(&email)
        .await?
        .ok_or(VerificationError::NotFound)?;

    let password_hash = hash_password_blocking(form.password.clone()).await?;
    consume_entry(&state, &entry).await?;
    state
        .repository
        .update_password(user.id, &password_hash, &generate_token_hash())
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %user.id,
        "Password reset completed"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Password updated successfully"
    })))
}
