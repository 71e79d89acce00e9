//! Domain service for authentication: password login, the OTP login path,
//! and self-service password changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    /// Deliberately does not distinguish wrong, expired, or already-used.
    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to send email to {0}")]
    Delivery(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<sea_orm::TransactionError<Self>> for AuthError {
    fn from(err: sea_orm::TransactionError<Self>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => e.into(),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}

/// The identity carried by a login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }
}

/// What a verified OTP means for the caller.
#[derive(Debug, Clone)]
pub enum OtpOutcome {
    /// The account exists but has never had a password set.
    NeedsPasswordSetup,
    /// Full login.
    LoggedIn(AuthenticatedUser),
}

/// User info DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i32,
    pub email: String,
    pub roles: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the session identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the email is unknown,
    /// the password is wrong, or setup was never completed.
    async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser, AuthError>;

    /// Issues a one-time login code to an existing user's email. The code
    /// row and the delivery stand or fall together.
    async fn request_otp(&self, email: &str) -> Result<(), AuthError>;

    /// Verifies and consumes a one-time code.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOtp`] for every failure mode.
    async fn verify_otp(&self, email: &str, code: &str) -> Result<OtpOutcome, AuthError>;

    /// Changes a user's password after verifying the current one.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Gets information for a specific user.
    async fn get_user_info(&self, user_id: i32) -> Result<UserInfo, AuthError>;
}
