//! Order route handlers.

use axum::Json;
use axum::extract::{Path, State};

use clove_core::OrderId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// `POST /api/orders/checkout`
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(state.store().as_ref())
        .checkout(&principal)
        .await?;
    Ok(Json(order))
}

/// `GET /api/orders`
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::new(state.store().as_ref())
        .my_orders(principal.user_id)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(state.store().as_ref())
        .order(&principal, id)
        .await?;
    Ok(Json(order))
}
