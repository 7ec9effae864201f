use axum::{
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth;
use crate::config;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::auth::{clear_session_cookie, session_cookie};
use crate::middleware::ApiResponse;
use crate::services::practice_service::{NewPractice, NewUser, PracticeService};
use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - exchange email and password for a session.
/// The token is set as a cookie and also returned for Bearer use.
pub async fn login(Json(body): Json<LoginRequest>) -> Result<Response, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let pool = DatabaseManager::pool()?;
    let user = PracticeService::new(pool).authenticate(&body.email, &body.password).await?;
    let token = auth::issue_token(&user)?;

    let security = &config::config().security;
    let expires_in = security.session_expiry_hours * 3600;
    let cookie = session_cookie(&security.session_cookie_name, &token, expires_in, security.secure_cookies);

    tracing::info!("User {} signed in", user.email);
    let data = json!({ "token": token, "expires_in": expires_in, "user": user });
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), ApiResponse::success(data)).into_response())
}

/// POST /auth/logout - clear the session cookie
pub async fn logout() -> Response {
    let security = &config::config().security;
    let cookie = clear_session_cookie(&security.session_cookie_name, security.secure_cookies);
    (AppendHeaders([(SET_COOKIE, cookie)]), ApiResponse::success(json!({ "logged_out": true }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub practice: NewPractice,
    pub admin: AdminSignup,
}

#[derive(Debug, Deserialize)]
pub struct AdminSignup {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// POST /auth/register - create a practice and its first admin
pub async fn register(Json(body): Json<RegisterRequest>) -> Result<Response, ApiError> {
    if !config::config().security.allow_registration {
        return Err(ApiError::forbidden("Registration is disabled"));
    }

    let pool = DatabaseManager::pool()?;
    let admin = NewUser {
        email: body.admin.email,
        name: body.admin.name,
        role: Role::Admin,
        password: body.admin.password,
    };
    let (practice, user) = PracticeService::new(pool).register(body.practice, admin).await?;
    tracing::info!("Registered practice {} ({})", practice.name, practice.id);

    Ok(ApiResponse::created(json!({ "practice": practice, "user": user })).into_response())
}
