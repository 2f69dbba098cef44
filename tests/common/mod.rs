#![allow(dead_code)]

use actix_web::{web, App, HttpResponse, HttpServer};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use auth_service::auth::TokenManager;
use auth_service::configuration::{JwtSettings, VerificationSettings};
use auth_service::email_client::{EmailClient, SenderEmail};
use auth_service::repository::InMemoryRepository;
use auth_service::startup::{run, AppState};

pub const PASSWORD: &str = "Str0ngPassword";

/// Captures every message the service tries to deliver
#[derive(Clone, Default)]
pub struct MockMailServer {
    messages: Arc<Mutex<Vec<Value>>>,
    failing: Arc<AtomicBool>,
}

impl MockMailServer {
    pub fn messages(&self) -> Vec<Value> {
        self.messages.lock().unwrap().clone()
    }

    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Code from the most recent message sent to `email`
    pub fn latest_code(&self, email: &str) -> String {
        let message = self
            .messages()
            .into_iter()
            .rev()
            .find(|m| m["To"] == email)
            .expect("No email sent to recipient");
        let text = message["TextBody"].as_str().expect("Missing text body");
        text.split_whitespace()
            .skip_while(|word| *word != "code")
            .nth(1)
            .expect("No code in email")
            .to_string()
    }
}

async fn record_email(body: web::Json<Value>, mail: web::Data<MockMailServer>) -> HttpResponse {
    if mail.failing.load(Ordering::SeqCst) {
        return HttpResponse::InternalServerError().finish();
    }
    mail.messages.lock().unwrap().push(body.into_inner());
    HttpResponse::Ok().finish()
}

fn spawn_mail_server() -> (String, MockMailServer) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let mail = MockMailServer::default();
    let data = web::Data::new(mail.clone());

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/email", web::post().to(record_email))
    })
    .listen(listener)
    .expect("Failed to listen")
    .workers(1)
    .run();
    let _ = tokio::spawn(server);

    (format!("http://127.0.0.1:{}", port), mail)
}

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/keys")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_token_private_key_path: fixture("access_private.pem"),
        access_token_public_key_path: fixture("access_public.pem"),
        refresh_token_private_key_path: fixture("refresh_private.pem"),
        refresh_token_public_key_path: fixture("refresh_public.pem"),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: None,
        issuer: "auth.service".to_string(),
    }
}

pub struct TestApp {
    pub address: String,
    pub repository: Arc<InMemoryRepository>,
    pub tokens: TokenManager,
    pub mail: MockMailServer,
    pub client: reqwest::Client,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(VerificationSettings::default()).await
}

pub async fn spawn_app_with(verification: VerificationSettings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let (mail_url, mail) = spawn_mail_server();
    let email_client = EmailClient::new(
        mail_url,
        SenderEmail::parse("noreply@example.com".to_string()).unwrap(),
        std::time::Duration::from_secs(2),
    )
    .expect("Failed to build email client");

    let tokens = TokenManager::from_settings(&jwt_settings()).expect("Failed to load test keys");
    let repository = Arc::new(InMemoryRepository::new());

    let state = AppState {
        repository: repository.clone(),
        tokens: tokens.clone(),
        email_client,
        verification,
    };
    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        repository,
        tokens,
        mail,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn signup(&self, email: &str) -> reqwest::Response {
        self.post_json(
            "/auth/signup",
            &json!({ "email": email, "password": PASSWORD, "username": "tester" }),
        )
        .await
    }

    pub async fn verify_mail(&self, email: &str, code: &str) -> reqwest::Response {
        self.post_json("/auth/verify/mail", &json!({ "email": email, "code": code }))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Sign up, verify and log in; returns the login body
    pub async fn registered_session(&self, email: &str) -> Value {
        assert_eq!(201, self.signup(email).await.status().as_u16());
        let code = self.mail.latest_code(email);
        assert_eq!(200, self.verify_mail(email, &code).await.status().as_u16());

        let response = self.login(email, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse login body")
    }

    pub async fn get_authorized(&self, path: &str, access_token: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}{}", self.address, path))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_authorized(&self, path: &str, access_token: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}
