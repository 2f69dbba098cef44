/// JWT Claims structure
///
/// Access and refresh claim sets share the registered `iss`/`iat`/`exp`
/// fields and are told apart by an explicit `key_type` discriminator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Registered claims (RFC 7519) common to both token families
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardClaims {
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl StandardClaims {
    fn new(issuer: &str, issued_at: DateTime<Utc>, lifetime: Option<Duration>) -> Self {
        Self {
            iss: issuer.to_string(),
            iat: issued_at.timestamp(),
            exp: lifetime.map(|l| (issued_at + l).timestamp()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: String,
    #[serde(flatten)]
    pub standard: StandardClaims,
}

impl AccessClaims {
    pub fn new(user_id: &str, issuer: &str, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            user_id: user_id.to_string(),
            standard: StandardClaims::new(issuer, issued_at, Some(lifetime)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: String,
    /// HMAC binding the token to the user's token hash at issuance
    pub custom_key: String,
    #[serde(flatten)]
    pub standard: StandardClaims,
}

impl RefreshClaims {
    pub fn new(
        user_id: &str,
        custom_key: String,
        issuer: &str,
        issued_at: DateTime<Utc>,
        lifetime: Option<Duration>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            custom_key,
            standard: StandardClaims::new(issuer, issued_at, lifetime),
        }
    }
}

/// Payload of either token family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key_type", rename_all = "lowercase")]
pub enum TokenClaims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl TokenClaims {
    pub fn kind(&self) -> TokenKind {
        match self {
            TokenClaims::Access(_) => TokenKind::Access,
            TokenClaims::Refresh(_) => TokenKind::Refresh,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            TokenClaims::Access(c) => &c.user_id,
            TokenClaims::Refresh(c) => &c.user_id,
        }
    }
}
