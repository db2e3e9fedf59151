//! Cart route handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clove_core::ProductId;

use crate::error::AppError;
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::CartLine;
use crate::services::cart::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CartLineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// One cart line on the wire, with its live subtotal.
#[derive(Debug, Serialize)]
pub struct CartItemDto {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

impl From<CartLine> for CartItemDto {
    fn from(line: CartLine) -> Self {
        let subtotal = line.subtotal();
        Self {
            product_id: line.product_id,
            name: line.name,
            image_url: line.image_url,
            unit_price: line.unit_price,
            quantity: line.quantity,
            subtotal,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartDto {
    pub items: Vec<CartItemDto>,
    pub total: Decimal,
}

/// `GET /api/cart`
pub async fn view(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<CartDto>, AppError> {
    let cart = CartService::new(state.store().as_ref())
        .view(principal.user_id)
        .await?;
    Ok(Json(CartDto {
        items: cart.lines.into_iter().map(Into::into).collect(),
        total: cart.total,
    }))
}

/// `POST /api/cart`
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Json(req): Json<CartLineRequest>,
) -> Result<Json<CartItemDto>, AppError> {
    let line = CartService::new(state.store().as_ref())
        .add(principal.user_id, req.product_id, req.quantity)
        .await?;
    Ok(Json(line.into()))
}

/// `PUT /api/cart`
///
/// A quantity of zero or less removes the line and answers 204.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Json(req): Json<CartLineRequest>,
) -> Result<axum::response::Response, AppError> {
    use axum::response::IntoResponse;

    let line = CartService::new(state.store().as_ref())
        .set_quantity(principal.user_id, req.product_id, req.quantity)
        .await?;
    Ok(match line {
        Some(line) => Json(CartItemDto::from(line)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// `DELETE /api/cart/{product_id}`
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    CartService::new(state.store().as_ref())
        .remove(principal.user_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
