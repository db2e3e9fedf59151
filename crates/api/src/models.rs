//! Domain records persisted by the store.
//!
//! These are storage-shaped rows, not wire DTOs: route handlers build their
//! own response types from them. Cart and order lines reference users and
//! products by key rather than holding owned object graphs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clove_core::{CategoryId, Email, OrderId, OrderStatus, ProductId, Role, UserId};

/// A registered user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a user. The password arrives already hashed;
/// the store never sees a plaintext password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
}

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: CategoryId,
    pub image_url: Option<String>,
}

/// Data required to create or update a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: CategoryId,
    pub image_url: Option<String>,
}

/// Upper bound on a single cart line's quantity.
///
/// Request quantities are validated against it and merges clamp to it, so
/// the stored quantity stays within `1..=MAX_LINE_QUANTITY` no matter how
/// many adds pile onto one line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// A cart line item joined with its product's live catalog data.
///
/// Prices here are NOT frozen; they track the catalog until checkout.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    /// Live subtotal for this line (`unit_price * quantity`).
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A line item frozen into an order at checkout time.
///
/// `unit_price`, `name` and `image_url` are captured from the product at the
/// moment of checkout and never change afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A persisted order with its frozen line items.
///
/// Immutable after creation except for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

/// One entry in the best-sellers ranking, aggregated over frozen order
/// lines.
#[derive(Debug, Clone, Serialize)]
pub struct BestSeller {
    pub product_id: ProductId,
    pub name: String,
    pub units_sold: i64,
}

/// Aggregate figures for the admin dashboard.
///
/// Revenue is the sum of all order totals; best sellers rank products by
/// units sold across all orders, capped at five entries.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub best_sellers: Vec<BestSeller>,
}

/// Freeze a cart into order lines, capturing each product's current price.
///
/// Returns the frozen lines and the order total (sum of `price * quantity`).
/// Both store backends call this inside their atomic checkout unit of work so
/// the price-at-purchase arithmetic lives in exactly one place.
#[must_use]
pub fn freeze_cart(lines: &[CartLine]) -> (Vec<OrderLine>, Decimal) {
    let mut total = Decimal::ZERO;
    let frozen = lines
        .iter()
        .map(|line| {
            total += line.subtotal();
            OrderLine {
                product_id: line.product_id,
                name: line.name.clone(),
                image_url: line.image_url.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            }
        })
        .collect();
    (frozen, total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product_id: i64, price: &str, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product_id),
            name: format!("product-{product_id}"),
            description: None,
            image_url: None,
            unit_price: price.parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_subtotal_is_price_times_quantity() {
        assert_eq!(line(1, "19.99", 3).subtotal(), "59.97".parse().unwrap());
    }

    #[test]
    fn test_freeze_cart_total_is_sum_of_subtotals() {
        let lines = vec![line(1, "10.00", 2), line(2, "0.50", 5)];
        let (frozen, total) = freeze_cart(&lines);

        assert_eq!(frozen.len(), 2);
        assert_eq!(total, "22.50".parse().unwrap());
        assert_eq!(frozen[0].unit_price, "10.00".parse().unwrap());
        assert_eq!(frozen[1].quantity, 5);
    }

    #[test]
    fn test_freeze_cart_empty_is_zero() {
        let (frozen, total) = freeze_cart(&[]);
        assert!(frozen.is_empty());
        assert_eq!(total, Decimal::ZERO);
    }
}
