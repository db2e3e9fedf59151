//! Application error taxonomy and the HTTP error envelope.
//!
//! Handlers return [`AppError`]; its `IntoResponse` impl records the failure
//! in a response extension, and [`error_envelope`] (an outer middleware that
//! knows the request path) rewrites it into the structured JSON body every
//! error response shares:
//!
//! ```json
//! {
//!   "timestamp": "2025-06-01T12:00:00Z",
//!   "status": 404,
//!   "error": "Not Found",
//!   "message": "product not found",
//!   "path": "/api/cart"
//! }
//! ```
//!
//! Validation failures additionally carry a `validation_errors` map of
//! field name to reason.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::token::TokenError;

/// Application-level errors returned by handlers and services.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, malformed, expired or forged credentials.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated, but the principal's role does not permit this.
    #[error("insufficient permissions")]
    Forbidden,

    /// The referenced resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The operation is not valid in the current state (empty-cart checkout,
    /// illegal order status transition).
    #[error("{0}")]
    InvalidState(String),

    /// A uniqueness or concurrency conflict.
    #[error("{0}")]
    Conflict(String),

    /// Request payload failed field validation.
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),

    /// Unexpected internal failure. The client sees a generic message; the
    /// cause goes to the log.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for a single-field validation failure.
    #[must_use]
    pub fn validation(field: &str, reason: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_owned(), reason.to_owned());
        Self::Validation(errors)
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound("record not found".to_owned()),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::EmptyCart => Self::InvalidState("cart is empty".to_owned()),
            StoreError::ProductVanished(id) => {
                Self::InvalidState(format!("product {id} is no longer available"))
            }
            StoreError::StaleState(message) => Self::Conflict(message),
            StoreError::Database(e) => Self::Internal(e.to_string()),
            StoreError::Corrupt(message) => Self::Internal(message),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        // Every token failure degrades to the same response; the distinction
        // stays server-side.
        Self::Unauthenticated
    }
}

/// Failure details stashed on the response for [`error_envelope`] to render.
#[derive(Debug, Clone)]
pub struct PendingError {
    status: StatusCode,
    message: String,
    validation_errors: Option<BTreeMap<String, String>>,
}

/// The JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, validation_errors) = match self {
            Self::Internal(ref cause) => {
                tracing::error!(error = %cause, "internal error");
                ("internal server error".to_owned(), None)
            }
            Self::Validation(errors) => ("validation failed".to_owned(), Some(errors)),
            other => (other.to_string(), None),
        };

        let mut response = status.into_response();
        response.extensions_mut().insert(PendingError {
            status,
            message,
            validation_errors,
        });
        response
    }
}

/// Outer middleware that turns a [`PendingError`] into the JSON envelope.
///
/// Lives outside the routers so it sees the request path, which
/// `IntoResponse` alone cannot.
pub async fn error_envelope(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let mut response = next.run(req).await;

    let Some(pending) = response.extensions_mut().remove::<PendingError>() else {
        return response;
    };

    let body = ApiError {
        timestamp: Utc::now(),
        status: pending.status.as_u16(),
        error: pending
            .status
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_owned(),
        message: pending.message,
        path,
        validation_errors: pending.validation_errors,
    };

    (pending.status, Json(body)).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("x".to_owned()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidState("x".to_owned()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("x".to_owned()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::validation("email", "required").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_store_errors_map_to_client_errors() {
        assert!(matches!(
            AppError::from(StoreError::EmptyCart),
            AppError::InvalidState(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::NotFound),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::StaleState("moved".to_owned())),
            AppError::Conflict(_)
        ));
    }

    #[test]
    fn test_token_errors_collapse_to_unauthenticated() {
        for e in [
            TokenError::Malformed,
            TokenError::InvalidSignature,
            TokenError::Expired,
            TokenError::SubjectMismatch,
        ] {
            assert!(matches!(AppError::from(e), AppError::Unauthenticated));
        }
    }
}
