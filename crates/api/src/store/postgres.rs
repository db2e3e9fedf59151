//! `PostgreSQL` store backend.
//!
//! Per-user serialization falls out of row locking: cart merges are a single
//! `ON CONFLICT` upsert, and checkout takes `FOR UPDATE` on the user's cart
//! rows inside one transaction, so a concurrent checkout for the same user
//! blocks and then observes an empty cart. Other users' rows are never
//! touched by either.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use clove_core::{CategoryId, Email, OrderId, OrderStatus, ProductId, Role, UserId};

use crate::models::{
    self, BestSeller, CartLine, Category, NewProduct, NewUser, Order, OrderLine, Product,
    StoreStats, User,
};

use super::{Store, StoreError};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// [`Store`] backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Frozen order lines for a set of orders, keyed by order.
    async fn order_lines(
        &self,
        order_ids: &[i64],
    ) -> Result<HashMap<OrderId, Vec<OrderLine>>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT order_id, product_id, name, image_url, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, product_id
            ",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id: OrderId = row.try_get("order_id")?;
            lines.entry(order_id).or_default().push(order_line(&row)?);
        }
        Ok(lines)
    }

    async fn orders_where(
        &self,
        query: &str,
        user: Option<UserId>,
    ) -> Result<Vec<Order>, StoreError> {
        let mut q = sqlx::query(query);
        if let Some(user) = user {
            q = q.bind(user);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let headers: Vec<Order> = rows
            .iter()
            .map(order_header)
            .collect::<Result<_, StoreError>>()?;
        let ids: Vec<i64> = headers.iter().map(|o| o.id.as_i64()).collect();
        let mut lines = self.order_lines(&ids).await?;

        Ok(headers
            .into_iter()
            .map(|mut order| {
                order.lines = lines.remove(&order.id).unwrap_or_default();
                order
            })
            .collect())
    }
}

fn user_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: row.try_get("role")?,
        created_at: row.try_get("created_at")?,
    })
}

fn category_row(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn product_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        category_id: row.try_get("category_id")?,
        image_url: row.try_get("image_url")?,
    })
}

fn cart_line_row(row: &PgRow) -> Result<CartLine, StoreError> {
    Ok(CartLine {
        product_id: row.try_get("product_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        unit_price: row.try_get("price")?,
        quantity: row.try_get("quantity")?,
    })
}

fn order_header(row: &PgRow) -> Result<Order, StoreError> {
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        total: row.try_get("total")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        lines: Vec::new(),
    })
}

fn order_line(row: &PgRow) -> Result<OrderLine, StoreError> {
    Ok(OrderLine {
        product_id: row.try_get("product_id")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
    })
}

fn map_unique_violation(e: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(message.to_owned());
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            r"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, created_at
            ",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email already exists"))?;

        user_row(&row)
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, email, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_row).transpose()
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_row).transpose()
    }

    async fn user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, email, role, created_at, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let hash: String = row.try_get("password_hash")?;
        Ok(Some((user_row(&row)?, hash)))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows =
            sqlx::query("SELECT id, name, email, role, created_at FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(user_row).collect()
    }

    async fn set_user_role(&self, id: UserId, role: Role) -> Result<User, StoreError> {
        let row = sqlx::query(
            r"
            UPDATE users SET role = $2
            WHERE id = $1
            RETURNING id, name, email, role, created_at
            ",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_row).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // Orders deliberately survive; they reference the user id without a
        // foreign key.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(category_row).collect()
    }

    async fn category_by_id(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(category_row).transpose()
    }

    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, StoreError> {
        let row = sqlx::query(
            r"
            INSERT INTO categories (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description
            ",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "category name already exists"))?;
        category_row(&row)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StoreError::Conflict("category still has products".to_owned());
                }
                StoreError::Database(e)
            })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_products(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Product>, StoreError> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    r"
                    SELECT id, name, description, price, category_id, image_url
                    FROM products WHERE category_id = $1 ORDER BY id
                    ",
                )
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r"
                    SELECT id, name, description, price, category_id, image_url
                    FROM products ORDER BY id
                    ",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(product_row).collect()
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, name, description, price, category_id, image_url
            FROM products WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(product_row).transpose()
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query(
            r"
            INSERT INTO products (name, description, price, category_id, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, category_id, image_url
            ",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.category_id)
        .bind(&new.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::NotFound;
            }
            StoreError::Database(e)
        })?;
        product_row(&row)
    }

    async fn update_product(
        &self,
        id: ProductId,
        new: NewProduct,
    ) -> Result<Product, StoreError> {
        let row = sqlx::query(
            r"
            UPDATE products
            SET name = $2, description = $3, price = $4, category_id = $5, image_url = $6
            WHERE id = $1
            RETURNING id, name, description, price, category_id, image_url
            ",
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.category_id)
        .bind(&new.image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::NotFound;
            }
            StoreError::Database(e)
        })?;
        row.as_ref().map(product_row).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM wishlist_items WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // Cart rows referencing the product stay; checkout detects them and
        // fails the whole order.
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT ci.product_id, p.name, p.description, p.image_url, p.price, ci.quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.product_id
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(cart_line_row).collect()
    }

    async fn add_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError> {
        let found = self.product_by_id(product).await?.ok_or(StoreError::NotFound)?;

        // Atomic increment: concurrent adds for the same pair serialize on
        // the row and never lose an update. LEAST clamps the merged quantity
        // to the per-line cap so repeated adds cannot overflow.
        let row = sqlx::query(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, LEAST($3, $4))
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $4)
            RETURNING quantity
            ",
        )
        .bind(user)
        .bind(product)
        .bind(quantity)
        .bind(models::MAX_LINE_QUANTITY)
        .fetch_one(&self.pool)
        .await?;

        Ok(CartLine {
            product_id: found.id,
            name: found.name,
            description: found.description,
            image_url: found.image_url,
            unit_price: found.price,
            quantity: row.try_get("quantity")?,
        })
    }

    async fn set_cart_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user)
        .bind(product)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let found = self.product_by_id(product).await?.ok_or(StoreError::NotFound)?;
        Ok(CartLine {
            product_id: found.id,
            name: found.name,
            description: found.description,
            image_url: found.image_url,
            unit_price: found.price,
            quantity,
        })
    }

    async fn remove_cart_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user)
            .bind(product)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn checkout(&self, user: UserId) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock this user's cart rows. A concurrent checkout for the same
        // user blocks here and finds the cart empty after we commit.
        let cart_rows = sqlx::query(
            r"
            SELECT product_id, quantity
            FROM cart_items
            WHERE user_id = $1
            ORDER BY product_id
            FOR UPDATE
            ",
        )
        .bind(user)
        .fetch_all(&mut *tx)
        .await?;

        if cart_rows.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let mut entries = Vec::with_capacity(cart_rows.len());
        for row in &cart_rows {
            let product: ProductId = row.try_get("product_id")?;
            let quantity: i32 = row.try_get("quantity")?;
            entries.push((product, quantity));
        }

        let ids: Vec<i64> = entries.iter().map(|(p, _)| p.as_i64()).collect();
        let product_rows = sqlx::query(
            r"
            SELECT id, name, description, price, category_id, image_url
            FROM products
            WHERE id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut products = HashMap::with_capacity(product_rows.len());
        for row in &product_rows {
            let product = product_row(row)?;
            products.insert(product.id, product);
        }

        let mut lines = Vec::with_capacity(entries.len());
        for (product_id, quantity) in entries {
            let product = products
                .get(&product_id)
                .ok_or(StoreError::ProductVanished(product_id))?;
            lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                description: product.description.clone(),
                image_url: product.image_url.clone(),
                unit_price: product.price,
                quantity,
            });
        }

        let (frozen, total) = models::freeze_cart(&lines);

        let order_row = sqlx::query(
            r"
            INSERT INTO orders (user_id, total, status)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, total, status, created_at
            ",
        )
        .bind(user)
        .bind(total)
        .bind(OrderStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;
        let mut order = order_header(&order_row)?;

        for line in &frozen {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, name, image_url, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(&line.image_url)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        order.lines = frozen;
        Ok(order)
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        self.orders_where(
            r"
            SELECT id, user_id, total, status, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
            Some(user),
        )
        .await
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.orders_where(
            r"
            SELECT id, user_id, total, status, created_at
            FROM orders
            ORDER BY created_at DESC, id DESC
            ",
            None,
        )
        .await
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, total, status, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = order_header(&row)?;
        let mut lines = self.order_lines(&[order.id.as_i64()]).await?;
        order.lines = lines.remove(&order.id).unwrap_or_default();
        Ok(Some(order))
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let row = sqlx::query(
            r"
            UPDATE orders SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id, user_id, total, status, created_at
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut order = order_header(&row)?;
                let mut lines = self.order_lines(&[order.id.as_i64()]).await?;
                order.lines = lines.remove(&order.id).unwrap_or_default();
                Ok(order)
            }
            // Distinguish a missing order from one whose status moved.
            None => match self.order_by_id(id).await? {
                Some(order) => Err(StoreError::StaleState(format!(
                    "order status is {}, expected {expected}",
                    order.status
                ))),
                None => Err(StoreError::NotFound),
            },
        }
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    async fn wishlist(&self, user: UserId) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT p.id, p.name, p.description, p.price, p.category_id, p.image_url
            FROM wishlist_items wi
            JOIN products p ON p.id = wi.product_id
            WHERE wi.user_id = $1
            ORDER BY p.id
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(product_row).collect()
    }

    async fn add_wishlist_item(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError> {
        if self.product_by_id(product).await?.is_none() {
            return Err(StoreError::NotFound);
        }
        sqlx::query(
            r"
            INSERT INTO wishlist_items (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user)
        .bind(product)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_wishlist_item(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user)
            .bind(product)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Stats
    // =========================================================================

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let counts = sqlx::query(
            r"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM products) AS total_products,
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COALESCE(SUM(total), 0) FROM orders) AS total_revenue
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r"
            SELECT product_id, name, SUM(quantity)::BIGINT AS units_sold
            FROM order_items
            GROUP BY product_id, name
            ORDER BY units_sold DESC, product_id
            LIMIT 5
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let best_sellers = rows
            .iter()
            .map(|row| {
                Ok(BestSeller {
                    product_id: row.try_get("product_id")?,
                    name: row.try_get("name")?,
                    units_sold: row.try_get("units_sold")?,
                })
            })
            .collect::<Result<_, StoreError>>()?;

        Ok(StoreStats {
            total_users: counts.try_get("total_users")?,
            total_products: counts.try_get("total_products")?,
            total_orders: counts.try_get("total_orders")?,
            total_revenue: counts.try_get("total_revenue")?,
            best_sellers,
        })
    }
}
