//! Out-of-band verification codes
//!
//! Codes confirm an email address after signup or authorize a password
//! reset. An entry is created here, persisted by the repository, delivered by
//! email, and deleted by the caller once redeemed.

use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, Rng};
use std::fmt;
use std::str::FromStr;

use crate::configuration::VerificationSettings;
use crate::error::VerificationError;

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationType {
    MainVerification,
    PasswordReset,
}

impl VerificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationType::MainVerification => "main-verification",
            VerificationType::PasswordReset => "password-reset",
        }
    }

    fn lifetime(&self, settings: &VerificationSettings) -> Duration {
        match self {
            VerificationType::MainVerification => Duration::minutes(settings.mail_expiry_minutes),
            VerificationType::PasswordReset => {
                Duration::minutes(settings.password_reset_expiry_minutes)
            }
        }
    }
}

impl fmt::Display for VerificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main-verification" => Ok(VerificationType::MainVerification),
            "password-reset" => Ok(VerificationType::PasswordReset),
            other => Err(format!("unknown verification type: {}", other)),
        }
    }
}

/// Generate a random letters-only code
pub fn generate_code(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

#[derive(Clone, PartialEq, Eq)]
pub struct VerificationEntry {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub verification_type: VerificationType,
}

impl fmt::Debug for VerificationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationEntry")
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .field("verification_type", &self.verification_type)
            .finish_non_exhaustive()
    }
}

impl VerificationEntry {
    /// Create a fresh entry for the caller to persist and deliver
    pub fn issue(
        email: &str,
        verification_type: VerificationType,
        settings: &VerificationSettings,
    ) -> Self {
        Self {
            email: email.to_string(),
            code: generate_code(settings.code_length),
            expires_at: Utc::now() + verification_type.lifetime(settings),
            verification_type,
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check a supplied code against this entry
    ///
    /// Applying the effect and deleting the entry is left to the caller.
    ///
    /// # Errors
    /// - `VerificationError::Expired` once `expires_at` has passed, even for the right code
    /// - `VerificationError::Mismatch` if the code differs
    pub fn redeem(&self, supplied_code: &str) -> Result<(), VerificationError> {
        self.redeem_at(supplied_code, Utc::now())
    }

    fn redeem_at(&self, supplied_code: &str, now: DateTime<Utc>) -> Result<(), VerificationError> {
        if self.is_expired_at(now) {
            return Err(VerificationError::Expired);
        }
        if supplied_code != self.code {
            return Err(VerificationError::Mismatch);
        }
        Ok(())
    }
}
