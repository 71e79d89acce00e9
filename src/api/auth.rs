use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, MessageResponse, validation};
use crate::services::{AuthenticatedUser, OtpOutcome, UserInfo};

/// Session key holding the logged-in identity.
const SESSION_USER_KEY: &str = "user";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub id: i32,
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Serialize)]
pub struct VerifyOtpResponse {
    pub message: String,
    pub needs_password_setup: bool,
}

#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Requires a logged-in session.
pub async fn auth_middleware(
    session: Session,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    if let Ok(Some(user)) = session.get::<AuthenticatedUser>(SESSION_USER_KEY).await {
        tracing::Span::current().record("user_id", user.id);
        return Ok(next.run(request).await);
    }

    Err(ApiError::Unauthorized("Not authenticated".to_string()))
}

/// Requires a logged-in session carrying the admin role.
pub async fn require_admin(
    session: Session,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&session).await?;

    if !user.is_admin() {
        return Err(ApiError::forbidden("Administrator access required"));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Authenticate with email and password; opens a session on success.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state.auth().login(&payload.email, &payload.password).await?;

    if let Err(e) = session.insert(SESSION_USER_KEY, &user).await {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    Ok(Json(ApiResponse::success(LoginResponse {
        id: user.id,
        email: user.email,
        roles: user.roles,
    })))
}

/// POST /auth/logout
/// Invalidate the current session.
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    (StatusCode::OK, "Logged out")
}

/// GET /auth/me
/// Current user information (requires authentication).
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = current_user(&session).await?;
    let info = state.auth().get_user_info(user.id).await?;

    Ok(Json(ApiResponse::success(info)))
}

/// PUT /auth/password
/// Change own password (requires current password verification).
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = current_user(&session).await?;

    state
        .auth()
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}

/// POST /auth/otp
/// Issue a one-time login code to an existing member's email.
pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OtpRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    state.auth().request_otp(email).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "OTP sent successfully. Check your email.".to_string(),
    })))
}

/// POST /auth/verify-otp
/// Verify and consume a one-time code. Logs the member in when their
/// password is already set; otherwise tells them to complete setup.
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<VerifyOtpResponse>>, ApiError> {
    if payload.email.is_empty() || payload.otp.is_empty() {
        return Err(ApiError::validation("Email and OTP are required"));
    }

    let outcome = state.auth().verify_otp(&payload.email, &payload.otp).await?;

    match outcome {
        OtpOutcome::NeedsPasswordSetup => Ok(Json(ApiResponse::success(VerifyOtpResponse {
            message: "OTP verified. Please set up your new password.".to_string(),
            needs_password_setup: true,
        }))),
        OtpOutcome::LoggedIn(user) => {
            if let Err(e) = session.insert(SESSION_USER_KEY, &user).await {
                return Err(ApiError::internal(format!("Failed to create session: {e}")));
            }

            Ok(Json(ApiResponse::success(VerifyOtpResponse {
                message: "Login successful".to_string(),
                needs_password_setup: false,
            })))
        }
    }
}

/// POST /auth/set-password
/// Redeem a setup token and set the account password.
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let redeemed = state
        .provision()
        .redeem_setup_token(&payload.token, &payload.password)
        .await?;

    tracing::info!("Password set for {}", redeemed.email);

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password set successfully. You can now log in.".to_string(),
    })))
}

// ============================================================================
// Helpers
// ============================================================================

/// Get the logged-in identity from the session, or fail as unauthorized.
pub async fn current_user(session: &Session) -> Result<AuthenticatedUser, ApiError> {
    session
        .get::<AuthenticatedUser>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
}
