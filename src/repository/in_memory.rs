use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::domain::User;
use crate::error::StorageError;
use crate::verification::{VerificationEntry, VerificationType};

/// Repository kept entirely in process memory
///
/// Used by tests and local runs without a database.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    verifications: Arc<RwLock<HashMap<(String, VerificationType), VerificationEntry>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_not_found(what: impl std::fmt::Display) -> StorageError {
    StorageError::NotFound(format!("user {}", what))
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, user: &User) -> Result<(), StorageError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(StorageError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn update(&self, user: &User) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&user.id).ok_or_else(|| user_not_found(user.id))?;

        stored.username = user.username.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn rotate_token_hash(&self, id: Uuid, token_hash: &str) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&id).ok_or_else(|| user_not_found(id))?;

        stored.token_hash = token_hash.to_string();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn set_verified(&self, email: &str, verified: bool) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        let stored = users
            .values_mut()
            .find(|u| u.email == email)
            .ok_or_else(|| user_not_found(email))?;

        stored.is_verified = verified;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_verification_entry(&self, entry: &VerificationEntry) -> Result<(), StorageError> {
        let mut verifications = self.verifications.write().await;
        verifications.insert(
            (entry.email.clone(), entry.verification_type),
            entry.clone(),
        );
        Ok(())
    }

    async fn find_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
    ) -> Result<Option<VerificationEntry>, StorageError> {
        let verifications = self.verifications.read().await;
        Ok(verifications
            .get(&(email.to_string(), verification_type))
            .cloned())
    }

    async fn delete_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
    ) -> Result<(), StorageError> {
        let mut verifications = self.verifications.write().await;
        verifications.remove(&(email.to_string(), verification_type));
        Ok(())
    }

    async fn consume_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
        code: &str,
    ) -> Result<bool, StorageError> {
        let mut verifications = self.verifications.write().await;
        let key = (email.to_string(), verification_type);

        match verifications.get(&key) {
            Some(entry) if entry.code == code => {
                verifications.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        token_hash: &str,
    ) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&id).ok_or_else(|| user_not_found(id))?;

        stored.password_hash = password_hash.to_string();
        stored.token_hash = token_hash.to_string();
        stored.updated_at = Utc::now();
        Ok(())
    }
}
