//! Wishlist route handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use clove_core::ProductId;

use crate::error::AppError;
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

/// `GET /api/wishlist`
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.store().wishlist(principal.user_id).await?;
    Ok(Json(products))
}

/// `POST /api/wishlist`
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Json(req): Json<WishlistRequest>,
) -> Result<StatusCode, AppError> {
    state
        .store()
        .add_wishlist_item(principal.user_id, req.product_id)
        .await?;
    Ok(StatusCode::CREATED)
}

/// `DELETE /api/wishlist/{product_id}`
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    state
        .store()
        .remove_wishlist_item(principal.user_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
