/// JWT Token Issuing and Validation
///
/// Access and refresh tokens are RS256-signed with separate key pairs.
/// Validation pins the algorithm to RS256, so `none` and HMAC-signed tokens
/// are rejected before any key is consulted.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{AccessClaims, RefreshClaims, TokenClaims, TokenKind};
use crate::auth::custom_key::derive_custom_key;
use crate::auth::keys::TokenKeys;
use crate::configuration::JwtSettings;
use crate::error::{AuthError, KeyError};

#[derive(Clone, Debug)]
pub struct TokenManager {
    keys: TokenKeys,
    issuer: String,
    access_token_lifetime: Duration,
    refresh_token_lifetime: Option<Duration>,
}

impl TokenManager {
    pub fn new(keys: TokenKeys, config: &JwtSettings) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            access_token_lifetime: Duration::minutes(config.access_token_expiry_minutes),
            refresh_token_lifetime: config.refresh_token_expiry_days.map(Duration::days),
        }
    }

    /// Load both key pairs from the configured paths
    pub fn from_settings(config: &JwtSettings) -> Result<Self, KeyError> {
        let keys = TokenKeys::from_settings(config)?;
        Ok(Self::new(keys, config))
    }

    pub fn access_token_lifetime(&self) -> Duration {
        self.access_token_lifetime
    }

    /// Issue a signed access token for a user
    ///
    /// # Errors
    /// Returns `AuthError::TokenSigning` if signing fails
    pub fn issue_access_token(&self, user_id: &str) -> Result<String, AuthError> {
        self.issue_access_token_at(user_id, Utc::now())
    }

    fn issue_access_token_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = TokenClaims::Access(AccessClaims::new(
            user_id,
            &self.issuer,
            issued_at,
            self.access_token_lifetime,
        ));
        sign(&claims, self.keys.access.encoding_key())
    }

    /// Issue a signed refresh token bound to the user's current token hash
    ///
    /// # Errors
    /// Returns `AuthError::TokenSigning` if signing fails
    pub fn issue_refresh_token(&self, user_id: &str, token_hash: &str) -> Result<String, AuthError> {
        let claims = TokenClaims::Refresh(RefreshClaims::new(
            user_id,
            derive_custom_key(user_id, token_hash),
            &self.issuer,
            Utc::now(),
            self.refresh_token_lifetime,
        ));
        sign(&claims, self.keys.refresh.encoding_key())
    }

    /// Validate an access token and return the user id it was issued for
    ///
    /// # Errors
    /// Returns `AuthError::InvalidToken` if the token is malformed, expired,
    /// signed with another algorithm or key, or is not an access token
    pub fn validate_access_token(&self, token: &str) -> Result<String, AuthError> {
        match self.parse(token, self.keys.access.decoding_key(), TokenKind::Access)? {
            TokenClaims::Access(claims) => Ok(claims.user_id),
            TokenClaims::Refresh(_) => Err(AuthError::InvalidToken),
        }
    }

    /// Validate a refresh token and return `(user_id, custom_key)`
    ///
    /// The caller still has to compare the custom key against the user's
    /// current token hash; that needs the stored record.
    pub fn validate_refresh_token(&self, token: &str) -> Result<(String, String), AuthError> {
        match self.parse(token, self.keys.refresh.decoding_key(), TokenKind::Refresh)? {
            TokenClaims::Refresh(claims) => Ok((claims.user_id, claims.custom_key)),
            TokenClaims::Access(_) => Err(AuthError::InvalidToken),
        }
    }

    fn validation(&self, kind: TokenKind) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;
        validation.validate_exp = true;

        let requires_exp = match kind {
            TokenKind::Access => true,
            TokenKind::Refresh => self.refresh_token_lifetime.is_some(),
        };
        if requires_exp {
            validation.set_required_spec_claims(&["exp", "iss"]);
        } else {
            validation.set_required_spec_claims(&["iss"]);
        }
        validation
    }

    fn parse(&self, token: &str, key: &DecodingKey, kind: TokenKind) -> Result<TokenClaims, AuthError> {
        let claims = decode::<TokenClaims>(token, key, &self.validation(kind))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(token_kind = kind.as_str(), error = %e, "Token validation failed");
                AuthError::InvalidToken
            })?;

        if claims.kind() != kind {
            tracing::warn!(
                expected = kind.as_str(),
                found = claims.kind().as_str(),
                "Token has the wrong key type"
            );
            return Err(AuthError::InvalidToken);
        }

        if claims.user_id().is_empty() {
            tracing::warn!(token_kind = kind.as_str(), "Token has an empty user id");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

fn sign(claims: &TokenClaims, key: &EncodingKey) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::RS256), claims, key).map_err(|e| {
        tracing::error!(token_kind = claims.kind().as_str(), error = %e, "Unable to sign token");
        AuthError::TokenSigning(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::custom_key::custom_key_matches;
    use crate::auth::keys::test_support::{fixture, test_keys};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_token_private_key_path: "unused".to_string(),
            access_token_public_key_path: "unused".to_string(),
            refresh_token_private_key_path: "unused".to_string(),
            refresh_token_public_key_path: "unused".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: None,
            issuer: "test".to_string(),
        }
    }

    fn manager() -> TokenManager {
        TokenManager::new(test_keys(), &get_test_config())
    }

    fn b64(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn test_access_token_round_trip() {
        let manager = manager();
        let token = manager.issue_access_token("u1").expect("Failed to issue token");

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(manager.validate_access_token(&token).unwrap(), "u1");
    }

    #[test]
    fn test_expired_access_token_is_rejected() {
        let manager = manager();
        let issued_at = Utc::now() - Duration::minutes(16);
        let token = manager.issue_access_token_at("u1", issued_at).unwrap();

        assert!(matches!(
            manager.validate_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let manager = manager();
        let token = manager.issue_refresh_token("u1", "abc").unwrap();

        let (user_id, custom_key) = manager.validate_refresh_token(&token).unwrap();
        assert_eq!(user_id, "u1");
        assert_eq!(custom_key, derive_custom_key("u1", "abc"));
    }

    #[test]
    fn test_refresh_token_has_no_expiry_by_default() {
        let manager = manager();
        let token = manager.issue_refresh_token("u1", "abc").unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();

        assert_eq!(claims["key_type"], "refresh");
        assert!(claims.get("exp").is_none());
    }

    #[test]
    fn test_configured_refresh_expiry_is_enforced() {
        let mut config = get_test_config();
        config.refresh_token_expiry_days = Some(-1);
        let manager = TokenManager::new(test_keys(), &config);
        let token = manager.issue_refresh_token("u1", "abc").unwrap();

        assert!(manager.validate_refresh_token(&token).is_err());
    }

    #[test]
    fn test_password_change_revokes_refresh_token() {
        let manager = manager();
        let r1 = manager.issue_refresh_token("u1", "abc").unwrap();
        let (user_id, custom_key) = manager.validate_refresh_token(&r1).unwrap();

        assert!(custom_key_matches(&custom_key, &user_id, "abc"));
        // token hash rotated to "xyz"
        assert!(!custom_key_matches(&custom_key, &user_id, "xyz"));
        assert_ne!(derive_custom_key("u1", "abc"), derive_custom_key("u1", "xyz"));
    }

    #[test]
    fn test_key_families_are_not_interchangeable() {
        let manager = manager();
        let access = manager.issue_access_token("u1").unwrap();
        let refresh = manager.issue_refresh_token("u1", "abc").unwrap();

        assert!(manager.validate_refresh_token(&access).is_err());
        assert!(manager.validate_access_token(&refresh).is_err());
    }

    #[test]
    fn test_wrong_discriminator_with_right_key_is_rejected() {
        let manager = manager();
        let claims = TokenClaims::Refresh(RefreshClaims::new(
            "u1",
            derive_custom_key("u1", "abc"),
            "test",
            Utc::now(),
            Some(Duration::minutes(5)),
        ));
        let token = sign(&claims, manager.keys.access.encoding_key()).unwrap();

        assert!(matches!(
            manager.validate_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_empty_user_id_is_rejected() {
        let manager = manager();
        let token = manager.issue_access_token("").unwrap();

        assert!(manager.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_none_algorithm_is_rejected() {
        let manager = manager();
        let header = serde_json::json!({"alg": "none", "typ": "JWT"});
        let claims = serde_json::json!({
            "key_type": "access",
            "user_id": "u1",
            "iss": "test",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 600
        });
        let token = format!("{}.{}.", b64(&header), b64(&claims));

        assert!(manager.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_hmac_signed_with_public_key_is_rejected() {
        let manager = manager();
        let public_pem = std::fs::read(fixture("access_public.pem")).unwrap();
        let claims = TokenClaims::Access(AccessClaims::new(
            "u1",
            "test",
            Utc::now(),
            Duration::minutes(5),
        ));
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&public_pem),
        )
        .unwrap();

        assert!(matches!(
            manager.validate_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_tampered_token() {
        let manager = manager();
        let token = manager.issue_access_token("u1").unwrap();
        let tampered = format!("{}X", token);

        assert!(manager.validate_access_token(&tampered).is_err());
        assert!(manager.validate_access_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let manager = manager();
        let token = manager.issue_access_token("u1").unwrap();

        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();
        let other = TokenManager::new(test_keys(), &config);

        assert!(other.validate_access_token(&token).is_err());
    }
}
