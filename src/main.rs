use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use auth_service::auth::TokenManager;
use auth_service::configuration::get_configuration;
use auth_service::email_client::{EmailClient, SenderEmail};
use auth_service::repository::PostgresRepository;
use auth_service::startup::{run, AppState};
use auth_service::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!(error = %e, "Failed to read configuration");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    // Key errors never carry key material or paths
    let tokens = TokenManager::from_settings(&configuration.jwt).map_err(|e| {
        tracing::error!(error = %e, "Failed to load signing keys");
        startup_error(std::io::ErrorKind::InvalidData, "Key loading error")
    })?;
    tracing::info!("Signing keys loaded");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create connection pool");
            startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to run migrations");
        startup_error(std::io::ErrorKind::Other, "Migration error")
    })?;
    tracing::info!("Database ready");

    let sender = SenderEmail::parse(configuration.email_client.sender_email.clone()).map_err(|e| {
        tracing::error!(error = %e, "Invalid sender email");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;
    let email_client = EmailClient::new(
        configuration.email_client.base_url.clone(),
        sender,
        configuration.email_client.timeout(),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to build email client");
        startup_error(std::io::ErrorKind::Other, "Email client error")
    })?;

    let state = AppState {
        repository: Arc::new(PostgresRepository::new(pool)),
        tokens,
        email_client,
        verification: configuration.verification.clone(),
    };

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    run(listener, state)?.await
}
