//! Cart operations.

use rust_decimal::Decimal;

use clove_core::{ProductId, UserId};

use crate::error::AppError;
use crate::models::{CartLine, MAX_LINE_QUANTITY};
use crate::store::Store;

/// A cart snapshot: lines plus the live total.
#[derive(Debug)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

/// Cart reads and mutations for one user.
pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The user's cart with per-line subtotals summed into a total.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store failure.
    pub async fn view(&self, user: UserId) -> Result<CartView, AppError> {
        let lines = self.store.cart_lines(user).await?;
        let total = lines.iter().map(CartLine::subtotal).sum();
        Ok(CartView { lines, total })
    }

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a quantity outside
    /// `1..=MAX_LINE_QUANTITY` and [`AppError::NotFound`] for an unknown
    /// product.
    pub async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartLine, AppError> {
        validate_quantity(quantity)?;
        if self.store.product_by_id(product).await?.is_none() {
            return Err(AppError::NotFound("product not found".to_owned()));
        }
        let line = self.store.add_cart_line(user, product, quantity).await?;
        tracing::debug!(user_id = %user, product_id = %product, quantity = line.quantity, "cart line merged");
        Ok(line)
    }

    /// Set a line's quantity. A quantity of zero or less removes the line
    /// and returns `None`; removal is idempotent, an absent line is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if `quantity >= 1` and no line exists
    /// for the product.
    pub async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<Option<CartLine>, AppError> {
        if quantity < 1 {
            self.store.remove_cart_line(user, product).await?;
            return Ok(None);
        }
        validate_quantity(quantity)?;

        let line = self.store.set_cart_quantity(user, product, quantity).await?;
        Ok(Some(line))
    }

    /// Remove a line. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store failure.
    pub async fn remove(&self, user: UserId, product: ProductId) -> Result<(), AppError> {
        self.store.remove_cart_line(user, product).await?;
        Ok(())
    }
}

fn validate_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::validation("quantity", "must be at least 1"));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::validation(
            "quantity",
            &format!("must be at most {MAX_LINE_QUANTITY}"),
        ));
    }
    Ok(())
}
