//! Admin route handlers.
//!
//! Every handler here takes [`RequireAdmin`]; non-admin callers never reach
//! the bodies.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rust_decimal::Decimal;
use serde::Deserialize;

use clove_core::{CategoryId, OrderId, OrderStatus, ProductId, Role, UserId};

use crate::error::AppError;
use crate::extract::Json;
use crate::middleware::RequireAdmin;
use crate::models::{Category, NewProduct, Order, Product, StoreStats};
use crate::routes::auth::UserInfo;
use crate::services::catalog::CatalogService;
use crate::services::orders::OrderService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: CategoryId,
    pub image_url: Option<String>,
}

impl From<ProductRequest> for NewProduct {
    fn from(req: ProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            category_id: req.category_id,
            image_url: req.image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

// =============================================================================
// Catalog
// =============================================================================

/// `POST /api/admin/categories`
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(req): Json<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = CatalogService::new(state.store().as_ref())
        .create_category(&req.name, req.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// `DELETE /api/admin/categories/{id}`
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.store().as_ref())
        .delete_category(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/admin/products`
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(req): Json<ProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let product = CatalogService::new(state.store().as_ref())
        .create_product(req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /api/admin/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<Product>, AppError> {
    let product = CatalogService::new(state.store().as_ref())
        .update_product(id, req.into())
        .await?;
    Ok(Json(product))
}

/// `DELETE /api/admin/products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.store().as_ref())
        .delete_product(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

/// `GET /api/admin/orders`
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::new(state.store().as_ref()).all_orders().await?;
    Ok(Json(orders))
}

/// `PUT /api/admin/orders/{id}/status`
pub async fn set_order_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(state.store().as_ref())
        .set_status(id, req.status)
        .await?;
    Ok(Json(order))
}

// =============================================================================
// Dashboard
// =============================================================================

/// `GET /api/admin/stats`
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<StoreStats>, AppError> {
    let stats = state.store().stats().await?;
    Ok(Json(stats))
}

// =============================================================================
// Users
// =============================================================================

/// `GET /api/admin/users`
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<UserInfo>>, AppError> {
    let users = state.store().list_users().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// `PUT /api/admin/users/{id}/role`
pub async fn set_user_role(
    State(state): State<AppState>,
    RequireAdmin(principal): RequireAdmin,
    Path(id): Path<UserId>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<UserInfo>, AppError> {
    // An admin demoting themselves would lock this surface shut.
    if id == principal.user_id && req.role != Role::Admin {
        return Err(AppError::InvalidState(
            "cannot change your own role".to_owned(),
        ));
    }
    let user = state.store().set_user_role(id, req.role).await?;
    Ok(Json(user.into()))
}

/// `DELETE /api/admin/users/{id}`
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(principal): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    if id == principal.user_id {
        return Err(AppError::InvalidState(
            "cannot delete your own account".to_owned(),
        ));
    }
    state.store().delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
