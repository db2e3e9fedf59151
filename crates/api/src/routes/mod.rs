//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness check
//! GET    /health/ready                  - Readiness check (probes the store)
//!
//! # Auth
//! POST   /api/auth/register             - Create an account, returns a token
//! POST   /api/auth/login                - Exchange credentials for a token
//! GET    /api/auth/me                   - Current user profile
//!
//! # Catalog (public)
//! GET    /api/categories                - List categories
//! GET    /api/products                  - List products (?category_id= filter)
//! GET    /api/products/{id}             - Product detail
//!
//! # Cart (authenticated)
//! GET    /api/cart                      - Cart with live prices and total
//! POST   /api/cart                      - Add to cart (merges quantities)
//! PUT    /api/cart                      - Set line quantity (<= 0 removes)
//! DELETE /api/cart/{product_id}         - Remove a line
//!
//! # Orders (authenticated)
//! POST   /api/orders/checkout           - Convert cart to a pending order
//! GET    /api/orders                    - Own orders, newest first
//! GET    /api/orders/{id}               - One order (owner or admin)
//!
//! # Wishlist (authenticated)
//! GET    /api/wishlist                  - Wishlisted products
//! POST   /api/wishlist                  - Add a product
//! DELETE /api/wishlist/{product_id}     - Remove a product
//!
//! # Admin
//! POST   /api/admin/categories          - Create category
//! DELETE /api/admin/categories/{id}     - Delete category (must be empty)
//! POST   /api/admin/products            - Create product
//! PUT    /api/admin/products/{id}       - Update product
//! DELETE /api/admin/products/{id}       - Delete product
//! GET    /api/admin/orders              - All orders
//! PUT    /api/admin/orders/{id}/status  - Advance order status
//! GET    /api/admin/stats               - Counts, revenue, best sellers
//! GET    /api/admin/users               - All users
//! PUT    /api/admin/users/{id}/role     - Change a user's role
//! DELETE /api/admin/users/{id}          - Delete a user
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod wishlist;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Assemble every route under one router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/auth", auth_routes())
        .merge(catalog_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/wishlist", wishlist_routes())
        .nest("/api/admin", admin_routes())
}

/// Liveness: the process is up. Does not touch dependencies.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness: verifies the store answers before reporting OK.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(catalog::list_categories))
        .route("/api/products", get(catalog::list_products))
        .route("/api/products/{id}", get(catalog::get_product))
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::view).post(cart::add).put(cart::update))
        .route("/{product_id}", delete(cart::remove))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(orders::checkout))
        .route("/", get(orders::list_mine))
        .route("/{id}", get(orders::get_order))
}

fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::list).post(wishlist::add))
        .route("/{product_id}", delete(wishlist::remove))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", post(admin::create_category))
        .route("/categories/{id}", delete(admin::delete_category))
        .route("/products", post(admin::create_product))
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/status", put(admin::set_order_status))
        .route("/stats", get(admin::stats))
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::set_user_role))
        .route("/users/{id}", delete(admin::delete_user))
}
