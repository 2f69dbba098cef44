//! Storage collaborator for credential records and verification entries
//!
//! The authentication core never owns storage; handlers talk to a
//! `Repository` trait object so the backend can be swapped.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryRepository;
pub use postgres::PostgresRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::User;
use crate::error::StorageError;
use crate::verification::{VerificationEntry, VerificationType};

#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert a new user; fails with `UniqueConstraintViolation` on a taken email
    async fn create(&self, user: &User) -> Result<(), StorageError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;

    /// Persist the username of an existing user
    ///
    /// Secrets (`password_hash`, `token_hash`) are never written here, so a
    /// stale copy of the user cannot undo a rotation.
    async fn update(&self, user: &User) -> Result<(), StorageError>;

    /// Replace only the token hash, revoking outstanding refresh tokens
    async fn rotate_token_hash(&self, id: Uuid, token_hash: &str) -> Result<(), StorageError>;

    async fn set_verified(&self, email: &str, verified: bool) -> Result<(), StorageError>;

    /// Store an entry, replacing any live entry for the same (email, type)
    async fn upsert_verification_entry(&self, entry: &VerificationEntry) -> Result<(), StorageError>;

    async fn find_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
    ) -> Result<Option<VerificationEntry>, StorageError>;

    async fn delete_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
    ) -> Result<(), StorageError>;

    /// Delete the entry only if it still holds `code`
    ///
    /// Returns `false` when the entry is gone or was replaced, so a code is
    /// consumed at most once even under concurrent redemption.
    async fn consume_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
        code: &str,
    ) -> Result<bool, StorageError>;

    /// Replace the password hash and token hash together
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        token_hash: &str,
    ) -> Result<(), StorageError>;
}
