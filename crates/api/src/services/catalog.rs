//! Catalog reads and admin catalog management.

use rust_decimal::Decimal;

use clove_core::{CategoryId, ProductId};

use crate::error::AppError;
use crate::models::{Category, NewProduct, Product};
use crate::store::Store;

/// Product and category operations.
pub struct CatalogService<'a> {
    store: &'a dyn Store,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    // =========================================================================
    // Public reads
    // =========================================================================

    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store failure.
    pub async fn categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.store.list_categories().await?)
    }

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the category filter does not match
    /// an existing category.
    pub async fn products(&self, category: Option<CategoryId>) -> Result<Vec<Product>, AppError> {
        if let Some(category) = category
            && self.store.category_by_id(category).await?.is_none()
        {
            return Err(AppError::NotFound("category not found".to_owned()));
        }
        Ok(self.store.list_products(category).await?)
    }

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown product.
    pub async fn product(&self, id: ProductId) -> Result<Product, AppError> {
        self.store
            .product_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("product not found".to_owned()))
    }

    // =========================================================================
    // Admin mutations
    // =========================================================================

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a blank name and
    /// [`AppError::Conflict`] for a duplicate one.
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "must not be blank"));
        }
        Ok(self.store.create_category(name, description).await?)
    }

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown category and
    /// [`AppError::Conflict`] if it still has products.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), AppError> {
        self.store.delete_category(id).await?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for bad fields and
    /// [`AppError::NotFound`] for an unknown category.
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, AppError> {
        validate_product(&new)?;
        let product = self.store.create_product(new).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for bad fields and
    /// [`AppError::NotFound`] for an unknown product or category.
    pub async fn update_product(&self, id: ProductId, new: NewProduct) -> Result<Product, AppError> {
        validate_product(&new)?;
        Ok(self.store.update_product(id, new).await?)
    }

    /// Delete a product. Wishlist rows go with it; cart rows referencing it
    /// remain and surface at checkout.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown product.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), AppError> {
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}

fn validate_product(new: &NewProduct) -> Result<(), AppError> {
    if new.name.trim().is_empty() {
        return Err(AppError::validation("name", "must not be blank"));
    }
    if new.price <= Decimal::ZERO {
        return Err(AppError::validation("price", "must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::store::memory::MemoryStore;

    use super::*;

    fn new_product(name: &str, price: &str, category_id: CategoryId) -> NewProduct {
        NewProduct {
            name: name.to_owned(),
            description: None,
            price: price.parse().unwrap(),
            category_id,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_product_validation() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        let category = service.create_category("tools", None).await.unwrap();

        assert!(matches!(
            service
                .create_product(new_product("  ", "1.00", category.id))
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service
                .create_product(new_product("wrench", "0", category.id))
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(
            service
                .create_product(new_product("wrench", "19.99", category.id))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_filter_by_unknown_category_is_not_found() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        assert!(matches!(
            service.products(Some(CategoryId::new(404))).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_category_with_products_cannot_be_deleted() {
        let store = MemoryStore::new();
        let service = CatalogService::new(&store);
        let category = service.create_category("tools", None).await.unwrap();
        service
            .create_product(new_product("wrench", "19.99", category.id))
            .await
            .unwrap();

        assert!(matches!(
            service.delete_category(category.id).await,
            Err(AppError::Conflict(_))
        ));
    }
}
