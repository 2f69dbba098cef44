use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::TokenManager;
use crate::configuration::VerificationSettings;
use crate::email_client::EmailClient;
use crate::middleware::JwtMiddleware;
use crate::repository::Repository;
use crate::routes::{
    current_user, health_check, login, logout, refresh, request_password_reset,
    resend_mail_verification, reset_password, signup, update_current_user, verify_mail,
};

/// Shared state handed to every handler
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub tokens: TokenManager,
    pub email_client: EmailClient,
    pub verification: VerificationSettings,
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let tokens = state.tokens.clone();
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(4096))
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/verify/mail", web::post().to(verify_mail))
                    .route("/verify/mail/resend", web::post().to(resend_mail_verification))
                    .route("/password-reset/code", web::post().to(request_password_reset))
                    .route("/password-reset", web::post().to(reset_password)),
            )
            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(tokens.clone()))
                    .route("/me", web::get().to(current_user))
                    .route("/me", web::put().to(update_current_user))
                    .route("/logout", web::post().to(logout)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
