use serde::Serialize;

use crate::error::EmailError;
use crate::validators::is_valid_email;
use crate::verification::{VerificationEntry, VerificationType};

/// HTTP client for the transactional mail API
#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
}

#[derive(Clone, Debug)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: String) -> Result<Self, EmailError> {
        let email = is_valid_email(&s).map_err(|e| EmailError::InvalidRecipient(e.to_string()))?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SenderEmail,
        timeout: std::time::Duration,
    ) -> Result<Self, EmailError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::SendFailed(format!("Unable to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            sender,
        })
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request = SendEmailRequest {
            from: self.sender.inner(),
            to: recipient,
            subject,
            html_body: html_content,
            text_body: text_content,
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send email");
                EmailError::SendFailed(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!(error = %e, "Email service returned error");
                EmailError::SendFailed(e.to_string())
            })?;

        Ok(())
    }

    /// Deliver a verification code to the entry's email address
    pub async fn send_verification_code(&self, entry: &VerificationEntry) -> Result<(), EmailError> {
        let (subject, purpose) = match entry.verification_type {
            VerificationType::MainVerification => ("Confirm your email address", "confirm your email address"),
            VerificationType::PasswordReset => ("Reset your password", "reset your password"),
        };
        let expires = entry.expires_at.format("%Y-%m-%d %H:%M UTC");

        let text = format!(
            "Use the code {} to {}. The code expires at {}.",
            entry.code, purpose, expires
        );
        let html = format!(
            "<p>Use the code <strong>{}</strong> to {}.</p><p>The code expires at {}.</p>",
            entry.code, purpose, expires
        );

        self.send_email(&entry.email, subject, &html, &text).await?;
        tracing::info!(
            verification_type = %entry.verification_type,
            "Verification code sent"
        );
        Ok(())
    }
}
