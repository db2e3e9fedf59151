//! Clove API - storefront backend.
//!
//! JSON HTTP API for a small shop: stateless bearer-token authentication,
//! a product catalog, per-user carts and wishlists, and a transactional
//! cart-to-order checkout.
//!
//! # Architecture
//!
//! - Axum handlers in [`routes`], thin over the services
//! - Business rules in [`services`]
//! - Persistence behind the [`store::Store`] trait (`PostgreSQL` in
//!   production, in-memory for tests)
//! - Auth as extractors in [`middleware`], backed by the [`token`] codec

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod token;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the complete application router.
///
/// The error envelope sits outside the routes so every failure, including
/// extractor rejections, is rendered as the structured JSON body. CORS is
/// only added when an allowed origin is configured.
#[must_use]
pub fn app(state: AppState) -> Router {
    let mut router = routes::router()
        .layer(axum::middleware::from_fn(error::error_envelope))
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = state.config().allowed_origin.as_deref() {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                router = router.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
                        .allow_headers(tower_http::cors::AllowHeaders::mirror_request()),
                );
            }
            Err(_) => {
                tracing::warn!(origin, "ignoring unparseable CLOVE_ALLOWED_ORIGIN");
            }
        }
    }

    router.with_state(state)
}
