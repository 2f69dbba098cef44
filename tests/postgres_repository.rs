//! Requires a running Postgres configured in `configuration.yaml`.
//! Run with `cargo test -- --ignored`.

use sqlx::{Connection, Executor, PgConnection, PgPool};

use auth_service::configuration::{get_configuration, DatabaseSettings, VerificationSettings};
use auth_service::domain::User;
use auth_service::error::StorageError;
use auth_service::repository::{PostgresRepository, Repository};
use auth_service::verification::{VerificationEntry, VerificationType};

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn repository() -> PostgresRepository {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    PostgresRepository::new(configure_database(&configuration.database).await)
}

fn user(email: &str) -> User {
    User::new(email.to_string(), "$2b$04$hash".to_string(), "tester".to_string())
}

#[tokio::test]
#[ignore]
async fn users_round_trip_through_postgres() {
    let repository = repository().await;
    let mut stored = user("pg@example.com");
    repository.create(&stored).await.unwrap();

    let found = repository.find_by_id(stored.id).await.unwrap().unwrap();
    assert_eq!(stored.email, found.email);
    assert_eq!(stored.token_hash, found.token_hash);

    repository.rotate_token_hash(stored.id, "rotated").await.unwrap();

    // The copy read before the rotation still holds the old token hash
    stored.username = "renamed".to_string();
    repository.update(&stored).await.unwrap();
    repository.set_verified(&stored.email, true).await.unwrap();

    let found = repository.find_by_email("pg@example.com").await.unwrap().unwrap();
    assert_eq!("renamed", found.username);
    assert_eq!("rotated", found.token_hash);
    assert!(found.is_verified);
}

#[tokio::test]
#[ignore]
async fn duplicate_email_is_a_unique_violation() {
    let repository = repository().await;
    repository.create(&user("dup@example.com")).await.unwrap();

    let result = repository.create(&user("dup@example.com")).await;

    assert!(matches!(result, Err(StorageError::UniqueConstraintViolation(_))));
}

#[tokio::test]
#[ignore]
async fn update_password_rotates_token_hash() {
    let repository = repository().await;
    let stored = user("pw@example.com");
    repository.create(&stored).await.unwrap();

    repository
        .update_password(stored.id, "$2b$04$other", "new-token-hash")
        .await
        .unwrap();

    let found = repository.find_by_id(stored.id).await.unwrap().unwrap();
    assert_eq!("$2b$04$other", found.password_hash);
    assert_eq!("new-token-hash", found.token_hash);

    let missing = repository
        .update_password(uuid::Uuid::new_v4(), "x", "y")
        .await;
    assert!(matches!(missing, Err(StorageError::NotFound(_))));
}

#[tokio::test]
#[ignore]
async fn verification_entries_are_replaced_per_email_and_type() {
    let repository = repository().await;
    let settings = VerificationSettings::default();
    let first = VerificationEntry::issue("v@example.com", VerificationType::PasswordReset, &settings);
    let second = VerificationEntry::issue("v@example.com", VerificationType::PasswordReset, &settings);

    repository.upsert_verification_entry(&first).await.unwrap();
    repository.upsert_verification_entry(&second).await.unwrap();

    let found = repository
        .find_verification_entry("v@example.com", VerificationType::PasswordReset)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.code, found.code);
    assert!(repository
        .find_verification_entry("v@example.com", VerificationType::MainVerification)
        .await
        .unwrap()
        .is_none());

    let consumed = repository
        .consume_verification_entry("v@example.com", VerificationType::PasswordReset, &first.code)
        .await
        .unwrap();
    assert!(!consumed || first.code == second.code);

    repository
        .delete_verification_entry("v@example.com", VerificationType::PasswordReset)
        .await
        .unwrap();
    assert!(repository
        .find_verification_entry("v@example.com", VerificationType::PasswordReset)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore]
async fn verification_entry_is_consumed_once() {
    let repository = repository().await;
    let entry = VerificationEntry::issue(
        "once@example.com",
        VerificationType::MainVerification,
        &VerificationSettings::default(),
    );
    repository.upsert_verification_entry(&entry).await.unwrap();

    let first = repository
        .consume_verification_entry("once@example.com", VerificationType::MainVerification, &entry.code)
        .await
        .unwrap();
    let second = repository
        .consume_verification_entry("once@example.com", VerificationType::MainVerification, &entry.code)
        .await
        .unwrap();

    assert!(first);
    assert!(!second);
}
