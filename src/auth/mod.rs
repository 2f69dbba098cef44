/// Authentication module
///
/// Password checks, RSA key loading, access/refresh token issuing and
/// validation, and the refresh-token binding used for revocation.

mod claims;
mod custom_key;
mod jwt;
mod keys;
mod password;

pub use claims::{AccessClaims, RefreshClaims, StandardClaims, TokenClaims, TokenKind};
pub use custom_key::{custom_key_matches, derive_custom_key, generate_token_hash};
pub use jwt::TokenManager;
pub use keys::{load_private_key, load_public_key, parse_private_key, parse_public_key, KeyPair, TokenKeys};
pub use password::{authenticate, hash_password};
