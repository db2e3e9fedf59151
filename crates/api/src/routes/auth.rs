//! Auth route handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use clove_core::{Email, Role, UserId};

use crate::error::AppError;
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public profile of a user.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let service = AuthService::new(state.store().as_ref(), state.tokens());
    let (_, token) = service.register(&req.name, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let service = AuthService::new(state.store().as_ref(), state.tokens());
    let (_, token) = service.login(&req.email, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}

/// `GET /api/auth/me`
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<UserInfo>, AppError> {
    let user = state
        .store()
        .user_by_id(principal.user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(user.into()))
}
