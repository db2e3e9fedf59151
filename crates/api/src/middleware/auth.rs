//! Bearer-token authentication extractors.
//!
//! The gate is stateless on the wire: each request carries its whole proof
//! in the `Authorization: Bearer <token>` header. Verification checks the
//! signature and expiry, then re-reads the user from the store, so role
//! changes and deletions take effect on the next request rather than at
//! token expiry. The role claim inside the token is informational only.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use clove_core::{Email, Role, UserId};

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, resolved against the store.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: UserId,
    pub email: Email,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively; surrounding whitespace around
/// the token is trimmed. Returns `None` for a missing header, a non-bearer
/// scheme, or an empty token.
#[must_use]
pub fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the request's bearer token and resolve its subject to a live user.
async fn authenticate(parts: &Parts, state: &AppState) -> Result<Principal, AppError> {
    let token = extract_bearer_token(parts).ok_or(AppError::Unauthenticated)?;
    let claims = state.tokens().verify(token, None)?;

    // A signed token for a since-deleted user must not authenticate.
    let email = Email::parse(&claims.sub).map_err(|_| AppError::Unauthenticated)?;
    let user = state
        .store()
        .user_by_email(&email)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(Principal {
        user_id: user.id,
        email: user.email,
        role: user.role,
    })
}

/// Extractor that rejects unauthenticated requests with 401.
pub struct RequireAuth(pub Principal);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

/// Extractor that additionally requires the admin role.
///
/// An unauthenticated request gets 401; an authenticated non-admin gets 403.
pub struct RequireAdmin(pub Principal);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = authenticate(parts, state).await?;
        if !principal.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(Self(principal))
    }
}

/// Extractor that never rejects: anonymous and invalid-token requests both
/// proceed as `None`.
pub struct OptionalAuth(pub Option<Principal>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state).await.ok()))
    }
}
