//! Authentication and account handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{non_blank, read_json};
use crate::auth::{issue_token, AuthUser};
use crate::{AppError, AppState, MessageResponse};
use tally_core::models::{NewUser, User, UserSummary};
use tally_core::{password, EmailMessage};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub code: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Returned by registration and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If that email is registered, a reset code has been sent to it";

fn auth_response(state: &AppState, user: &User, message: &str) -> Result<Json<AuthResponse>, AppError> {
    let token = issue_token(&user.id, &state.config.jwt_secret, state.config.token_ttl_days)?;
    Ok(Json(AuthResponse {
        message: message.to_string(),
        token,
        user: user.summary(),
    }))
}

/// POST /api/auth/register - Create an account and sign in
pub async fn register(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let req: RegisterRequest = read_json(request).await?;

    let (Some(email), Some(password), Some(name)) = (
        non_blank(req.email),
        req.password.filter(|p| !p.is_empty()),
        non_blank(req.name),
    ) else {
        return Err(AppError::bad_request("Email, password and name are required"));
    };
    if !email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }
    password::validate_password(&password)?;

    let user = state.db.create_user(&NewUser {
        email,
        name,
        password_hash: password::hash_password(&password)?,
    })?;

    let response = auth_response(&state, &user, "User registered")?;
    Ok((StatusCode::CREATED, response))
}

/// POST /api/auth/login - Exchange credentials for a token
pub async fn login(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AuthResponse>, AppError> {
    let req: LoginRequest = read_json(request).await?;

    let (Some(email), Some(password)) = (non_blank(req.email), req.password) else {
        return Err(AppError::bad_request("Email and password are required"));
    };

    let invalid = || AppError::unauthorized("Invalid email or password");
    let user = state.db.get_user_by_email(&email)?.ok_or_else(invalid)?;
    if !password::verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    info!(user_id = %user.id, "User logged in");
    auth_response(&state, &user, "Login successful")
}

/// POST /api/auth/forgot-password - Email a reset code
///
/// Answers the same way whether or not the email is registered.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<MessageResponse>, AppError> {
    let req: ForgotPasswordRequest = read_json(request).await?;
    let email = non_blank(req.email).ok_or_else(|| AppError::bad_request("Email is required"))?;

    if let Some(user) = state.db.get_user_by_email(&email)? {
        let code = password::generate_reset_code();
        let expires_at = state.clock.now() + password::reset_code_ttl();
        state.db.set_reset_code(&user.id, &code, expires_at)?;

        let message = EmailMessage::reset_code(&user.email, &user.name, &code);
        if let Err(e) = state.mailer.send(message).await {
            // The code stays valid; the user can ask again
            error!(user_id = %user.id, error = %e, "Failed to send reset code");
        } else {
            info!(user_id = %user.id, "Reset code issued");
        }
    }

    Ok(MessageResponse::new(FORGOT_PASSWORD_MESSAGE))
}

/// POST /api/auth/reset-password - Set a new password using a reset code
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<MessageResponse>, AppError> {
    let req: ResetPasswordRequest = read_json(request).await?;

    let (Some(email), Some(code), Some(new_password)) =
        (non_blank(req.email), non_blank(req.code), req.new_password)
    else {
        return Err(AppError::bad_request("Email, code and newPassword are required"));
    };
    password::validate_password(&new_password)?;

    // Hash only once the code checks out
    let user = state
        .db
        .verify_reset_code(&email, &code, state.clock.now())?;
    let hash = password::hash_password(&new_password)?;
    state.db.redeem_reset_code(&user.id, &code, &hash)?;

    Ok(MessageResponse::new("Password has been reset"))
}

/// GET /api/auth/me - The signed-in user
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .db
        .get_user(&auth.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(MeResponse { user }))
}

/// PUT /api/auth/change-password - Change password after checking the current one
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    request: Request,
) -> Result<Json<MessageResponse>, AppError> {
    let req: ChangePasswordRequest = read_json(request).await?;

    let (Some(current), Some(new_password)) = (req.current_password, req.new_password) else {
        return Err(AppError::bad_request(
            "currentPassword and newPassword are required",
        ));
    };
    password::validate_password(&new_password)?;

    let user = state
        .db
        .get_user(&auth.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    if !password::verify_password(&current, &user.password_hash)? {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    state
        .db
        .update_password(&user.id, &password::hash_password(&new_password)?)?;
    info!(user_id = %user.id, "Password changed");

    Ok(MessageResponse::new("Password changed"))
}

/// DELETE /api/auth/account - Delete the signed-in user
///
/// Transactions and budgets are not removed.
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state.db.delete_user(&auth.id)?;
    Ok(MessageResponse::new("Account deleted"))
}
