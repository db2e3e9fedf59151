//! In-memory store backend.
//!
//! Backs the integration tests and local development without a database.
//! Tables are plain maps keyed by ID, with cart and wishlist rows keyed by
//! `(user, product)` - the same arena-and-index shape as the Postgres
//! schema. Cart and checkout mutations take a per-user async mutex so the
//! serialization guarantees match the row-locking the Postgres backend gets
//! for free; reads and other-user writes are never blocked by it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use clove_core::{CategoryId, Email, OrderId, OrderStatus, ProductId, Role, UserId};

use crate::models::{
    self, BestSeller, CartLine, Category, NewProduct, NewUser, Order, Product, StoreStats, User,
};

use super::{Store, StoreError};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, UserRow>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    cart: BTreeMap<(UserId, ProductId), i32>,
    wishlist: BTreeSet<(UserId, ProductId)>,
    orders: BTreeMap<OrderId, Order>,
    next_id: i64,
}

struct UserRow {
    user: User,
    password_hash: String,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn cart_entries(&self, user: UserId) -> Vec<(ProductId, i32)> {
        self.cart
            .range((user, ProductId::new(i64::MIN))..=(user, ProductId::new(i64::MAX)))
            .map(|(&(_, product), &quantity)| (product, quantity))
            .collect()
    }

    fn priced_line(&self, product: ProductId, quantity: i32) -> Option<CartLine> {
        self.products.get(&product).map(|p| CartLine {
            product_id: p.id,
            name: p.name.clone(),
            description: p.description.clone(),
            image_url: p.image_url.clone(),
            unit_price: p.price,
            quantity,
        })
    }
}

/// In-memory [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The serialization lock for one user's cart mutations. Locks are
    /// created lazily and never removed; the registry stays proportional to
    /// the number of users seen.
    fn user_lock(&self, user: UserId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.user_locks
                .lock()
                .entry(user)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.lock();
        if t.users.values().any(|row| row.user.email == new.email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }

        let user = User {
            id: UserId::new(t.next_id()),
            name: new.name,
            email: new.email,
            role: new.role,
            created_at: Utc::now(),
        };
        t.users.insert(
            user.id,
            UserRow {
                user: user.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(user)
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock();
        Ok(t.users
            .values()
            .find(|row| &row.user.email == email)
            .map(|row| row.user.clone()))
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().users.get(&id).map(|row| row.user.clone()))
    }

    async fn user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError> {
        let t = self.tables.lock();
        Ok(t.users
            .values()
            .find(|row| &row.user.email == email)
            .map(|row| (row.user.clone(), row.password_hash.clone())))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let t = self.tables.lock();
        Ok(t.users.values().map(|row| row.user.clone()).collect())
    }

    async fn set_user_role(&self, id: UserId, role: Role) -> Result<User, StoreError> {
        let mut t = self.tables.lock();
        let row = t.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.user.role = role;
        Ok(row.user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if t.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        t.cart.retain(|&(user, _), _| user != id);
        t.wishlist.retain(|&(user, _)| user != id);
        // Orders are history and survive the owner.
        Ok(())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.tables.lock().categories.values().cloned().collect())
    }

    async fn category_by_id(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(self.tables.lock().categories.get(&id).cloned())
    }

    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, StoreError> {
        let mut t = self.tables.lock();
        let category = Category {
            id: CategoryId::new(t.next_id()),
            name: name.to_owned(),
            description: description.map(ToOwned::to_owned),
        };
        t.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if t.products.values().any(|p| p.category_id == id) {
            return Err(StoreError::Conflict(
                "category still has products".to_owned(),
            ));
        }
        if t.categories.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_products(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Product>, StoreError> {
        let t = self.tables.lock();
        Ok(t.products
            .values()
            .filter(|p| category.is_none_or(|c| p.category_id == c))
            .cloned()
            .collect())
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.lock().products.get(&id).cloned())
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        let mut t = self.tables.lock();
        if !t.categories.contains_key(&new.category_id) {
            return Err(StoreError::NotFound);
        }
        let product = Product {
            id: ProductId::new(t.next_id()),
            name: new.name,
            description: new.description,
            price: new.price,
            category_id: new.category_id,
            image_url: new.image_url,
        };
        t.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        new: NewProduct,
    ) -> Result<Product, StoreError> {
        let mut t = self.tables.lock();
        if !t.categories.contains_key(&new.category_id) {
            return Err(StoreError::NotFound);
        }
        let product = t.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        product.name = new.name;
        product.description = new.description;
        product.price = new.price;
        product.category_id = new.category_id;
        product.image_url = new.image_url;
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if t.products.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        // Cart lines referencing the product are left in place; checkout
        // detects them and fails the whole order.
        t.wishlist.retain(|&(_, product)| product != id);
        Ok(())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, StoreError> {
        let t = self.tables.lock();
        Ok(t.cart_entries(user)
            .into_iter()
            .filter_map(|(product, quantity)| t.priced_line(product, quantity))
            .collect())
    }

    async fn add_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let mut t = self.tables.lock();
        if !t.products.contains_key(&product) {
            return Err(StoreError::NotFound);
        }
        // Merges saturate and clamp so no sequence of adds can overflow or
        // exceed the per-line cap.
        let merged = t
            .cart
            .entry((user, product))
            .and_modify(|q| *q = q.saturating_add(quantity).min(models::MAX_LINE_QUANTITY))
            .or_insert(quantity.min(models::MAX_LINE_QUANTITY));
        let merged = *merged;
        t.priced_line(product, merged).ok_or(StoreError::NotFound)
    }

    async fn set_cart_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let mut t = self.tables.lock();
        let slot = t.cart.get_mut(&(user, product)).ok_or(StoreError::NotFound)?;
        *slot = quantity;
        t.priced_line(product, quantity).ok_or(StoreError::NotFound)
    }

    async fn remove_cart_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        self.tables.lock().cart.remove(&(user, product));
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn checkout(&self, user: UserId) -> Result<Order, StoreError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let mut t = self.tables.lock();
        let entries = t.cart_entries(user);
        if entries.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(entries.len());
        for (product, quantity) in &entries {
            let line = t
                .priced_line(*product, *quantity)
                .ok_or(StoreError::ProductVanished(*product))?;
            lines.push(line);
        }

        let (frozen, total) = models::freeze_cart(&lines);
        let order = Order {
            id: OrderId::new(t.next_id()),
            user_id: user,
            total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            lines: frozen,
        };

        t.orders.insert(order.id, order.clone());
        for (product, _) in entries {
            t.cart.remove(&(user, product));
        }
        Ok(order)
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        let t = self.tables.lock();
        let mut orders: Vec<Order> = t
            .orders
            .values()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let t = self.tables.lock();
        let mut orders: Vec<Order> = t.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.lock().orders.get(&id).cloned())
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut t = self.tables.lock();
        let order = t.orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        if order.status != expected {
            return Err(StoreError::StaleState(format!(
                "order status is {}, expected {expected}",
                order.status
            )));
        }
        order.status = next;
        Ok(order.clone())
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    async fn wishlist(&self, user: UserId) -> Result<Vec<Product>, StoreError> {
        let t = self.tables.lock();
        Ok(t.wishlist
            .range((user, ProductId::new(i64::MIN))..=(user, ProductId::new(i64::MAX)))
            .filter_map(|&(_, product)| t.products.get(&product).cloned())
            .collect())
    }

    async fn add_wishlist_item(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if !t.products.contains_key(&product) {
            return Err(StoreError::NotFound);
        }
        t.wishlist.insert((user, product));
        Ok(())
    }

    async fn remove_wishlist_item(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError> {
        self.tables.lock().wishlist.remove(&(user, product));
        Ok(())
    }

    // =========================================================================
    // Stats
    // =========================================================================

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let t = self.tables.lock();

        let mut sold: HashMap<ProductId, (String, i64)> = HashMap::new();
        for order in t.orders.values() {
            for line in &order.lines {
                let entry = sold
                    .entry(line.product_id)
                    .or_insert_with(|| (line.name.clone(), 0));
                entry.1 += i64::from(line.quantity);
            }
        }
        let mut best_sellers: Vec<BestSeller> = sold
            .into_iter()
            .map(|(product_id, (name, units_sold))| BestSeller {
                product_id,
                name,
                units_sold,
            })
            .collect();
        best_sellers.sort_by(|a, b| {
            b.units_sold
                .cmp(&a.units_sold)
                .then(a.product_id.cmp(&b.product_id))
        });
        best_sellers.truncate(5);

        Ok(StoreStats {
            total_users: count(t.users.len()),
            total_products: count(t.products.len()),
            total_orders: count(t.orders.len()),
            total_revenue: t.orders.values().map(|o| o.total).sum(),
            best_sellers,
        })
    }
}

fn count(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}
