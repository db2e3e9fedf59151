//! Persistence layer.
//!
//! [`Store`] is the single seam between the domain and storage. The
//! production backend is [`postgres::PgStore`]; [`memory::MemoryStore`] backs
//! tests and local development. Both uphold the same contract:
//!
//! - at most one cart line per `(user, product)` pair, merged on repeated add;
//! - cart and checkout mutations for one user are serialized against each
//!   other (never globally across users);
//! - [`Store::checkout`] is a single unit of work: freeze prices, create the
//!   order, clear the cart - all or nothing.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use clove_core::{CategoryId, Email, OrderId, OrderStatus, ProductId, Role, UserId};

use crate::models::{
    CartLine, Category, NewProduct, NewUser, Order, Product, StoreStats, User,
};

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("record not found")]
    NotFound,
    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),
    /// Checkout was attempted against an empty cart.
    #[error("cart is empty")]
    EmptyCart,
    /// A carted product was deleted before checkout; the checkout fails as a
    /// whole rather than silently skipping the line.
    #[error("product {0} is no longer available")]
    ProductVanished(ProductId),
    /// The expected current state did not hold (e.g. an order status moved
    /// under a concurrent update).
    #[error("{0}")]
    StaleState(String),
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored value could not be interpreted.
    #[error("data corruption: {0}")]
    Corrupt(String),
}

/// Transactional record store for users, catalog, carts and orders.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the email is already registered.
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Look up a user together with their password hash, for login.
    async fn user_credentials(&self, email: &Email)
    -> Result<Option<(User, String)>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Set a user's role.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the user does not exist.
    async fn set_user_role(&self, id: UserId, role: Role) -> Result<User, StoreError>;

    /// Delete a user along with their cart and wishlist rows. Orders are
    /// history and survive the owner.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the user does not exist.
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn category_by_id(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, StoreError>;

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError>;

    /// List products, optionally restricted to a category.
    async fn list_products(&self, category: Option<CategoryId>)
    -> Result<Vec<Product>, StoreError>;

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn create_product(&self, new: NewProduct) -> Result<Product, StoreError>;

    async fn update_product(&self, id: ProductId, new: NewProduct)
    -> Result<Product, StoreError>;

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;

    // =========================================================================
    // Cart
    // =========================================================================

    /// All cart lines for a user, joined with live product data.
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, StoreError>;

    /// Add `quantity` of a product to the user's cart. If a line for the
    /// pair already exists its quantity is incremented (merge, never a
    /// second line); increments are applied serially, so concurrent adds
    /// never lose an update. The merged quantity clamps to
    /// [`crate::models::MAX_LINE_QUANTITY`].
    async fn add_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError>;

    /// Overwrite the quantity of an existing line (`quantity >= 1`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no line exists for the pair.
    async fn set_cart_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError>;

    /// Delete a cart line. Idempotent: removing an absent line is a no-op.
    async fn remove_cart_line(&self, user: UserId, product: ProductId)
    -> Result<(), StoreError>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// Atomically convert the user's cart into an order: freeze each
    /// product's current price into an order line, sum the total, persist
    /// the order, and clear the cart - as one unit of work. Of two
    /// concurrent checkouts for the same user, exactly one succeeds; the
    /// other observes [`StoreError::EmptyCart`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyCart`] if the cart has no lines, or
    /// [`StoreError::ProductVanished`] if any carted product has been
    /// deleted (nothing is persisted in either case).
    async fn checkout(&self, user: UserId) -> Result<Order, StoreError>;

    /// A user's own orders, newest first.
    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, StoreError>;

    /// All orders across users, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Move an order from `expected` to `next`, failing if the stored status
    /// is no longer `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the order does not exist, or
    /// [`StoreError::StaleState`] if its status moved concurrently.
    async fn set_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError>;

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Products on the user's wishlist.
    async fn wishlist(&self, user: UserId) -> Result<Vec<Product>, StoreError>;

    /// Add a product to the wishlist. Idempotent.
    async fn add_wishlist_item(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError>;

    /// Remove a product from the wishlist. Idempotent.
    async fn remove_wishlist_item(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError>;

    // =========================================================================
    // Stats
    // =========================================================================

    /// Aggregate counts, total revenue and the top five best-selling
    /// products, for the admin dashboard.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
