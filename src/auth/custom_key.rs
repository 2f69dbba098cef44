/// Refresh Token Binding
///
/// A refresh token embeds `HMAC-SHA256(key = token_hash, msg = user_id)`.
/// The token hash is a per-user secret kept in storage; rotating it (logout,
/// password change) makes every refresh token issued before the rotation
/// fail the binding check, without keeping a token blacklist.

use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HASH_LENGTH: usize = 32;

fn keyed_mac(user_id: &str, token_hash: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(token_hash.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(user_id.as_bytes());
    mac
}

/// Derive the hex-encoded custom key for a user and token hash
pub fn derive_custom_key(user_id: &str, token_hash: &str) -> String {
    hex::encode(keyed_mac(user_id, token_hash).finalize().into_bytes())
}

/// Check an embedded custom key against the user's current token hash
///
/// Compares in constant time; a key that is not valid hex never matches.
pub fn custom_key_matches(custom_key: &str, user_id: &str, token_hash: &str) -> bool {
    match hex::decode(custom_key) {
        Ok(tag) => keyed_mac(user_id, token_hash).verify_slice(&tag).is_ok(),
        Err(_) => false,
    }
}

/// Generate a fresh random token hash for a user
pub fn generate_token_hash() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_HASH_LENGTH)
        .map(char::from)
        .collect()
}
