//! Public catalog route handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use clove_core::{CategoryId, ProductId};

use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::models::{Category, Product};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
}

/// Product detail as served to one caller.
///
/// `wishlisted` is only present for authenticated callers; anonymous
/// requests get the bare product.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wishlisted: Option<bool>,
}

/// `GET /api/categories`
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = CatalogService::new(state.store().as_ref())
        .categories()
        .await?;
    Ok(Json(categories))
}

/// `GET /api/products`
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = CatalogService::new(state.store().as_ref())
        .products(filter.category_id)
        .await?;
    Ok(Json(products))
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>, AppError> {
    let product = CatalogService::new(state.store().as_ref()).product(id).await?;

    let wishlisted = match principal {
        Some(principal) => Some(
            state
                .store()
                .wishlist(principal.user_id)
                .await?
                .iter()
                .any(|p| p.id == product.id),
        ),
        None => None,
    };

    Ok(Json(ProductDetail {
        product,
        wishlisted,
    }))
}
