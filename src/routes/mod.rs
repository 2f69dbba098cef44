mod account;
mod auth;
mod health_check;
mod verification;

pub use account::{current_user, logout, update_current_user, UserResponse};
pub use auth::{login, refresh, signup, AuthResponse, RefreshResponse};
pub use health_check::health_check;
pub use verification::{
    request_password_reset, resend_mail_verification, reset_password, verify_mail,
};
