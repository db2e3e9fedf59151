//! Checkout and order management.

use clove_core::{OrderId, OrderStatus, UserId};

use crate::error::AppError;
use crate::middleware::Principal;
use crate::models::Order;
use crate::store::Store;

/// Checkout and order queries.
pub struct OrderService<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Convert the caller's cart into a pending order.
    ///
    /// Admin accounts manage the shop and cannot place orders.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidState`] for an admin caller or an empty
    /// cart.
    pub async fn checkout(&self, principal: &Principal) -> Result<Order, AppError> {
        if principal.is_admin() {
            return Err(AppError::InvalidState(
                "admin accounts cannot place orders".to_owned(),
            ));
        }

        let order = self.store.checkout(principal.user_id).await?;
        tracing::info!(
            user_id = %principal.user_id,
            order_id = %order.id,
            total = %order.total,
            "order placed"
        );
        Ok(order)
    }

    /// The caller's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store failure.
    pub async fn my_orders(&self, user: UserId) -> Result<Vec<Order>, AppError> {
        Ok(self.store.orders_for_user(user).await?)
    }

    /// One order, visible to its owner or any admin.
    ///
    /// A non-owner gets the same 404 as a nonexistent order; order IDs do
    /// not leak across accounts.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the order is missing or not
    /// visible to the caller.
    pub async fn order(&self, principal: &Principal, id: OrderId) -> Result<Order, AppError> {
        let order = self
            .store
            .order_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("order not found".to_owned()))?;
        if order.user_id != principal.user_id && !principal.is_admin() {
            return Err(AppError::NotFound("order not found".to_owned()));
        }
        Ok(order)
    }

    /// All orders across users (admin surface).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on store failure.
    pub async fn all_orders(&self) -> Result<Vec<Order>, AppError> {
        Ok(self.store.list_orders().await?)
    }

    /// Move an order to a new status, enforcing the lifecycle.
    ///
    /// Legal moves: pending to processing or cancelled, processing to
    /// shipped or cancelled, shipped to delivered. Delivered and cancelled
    /// are terminal. The store applies the move compare-and-set style, so a
    /// concurrent transition surfaces as a conflict rather than silently
    /// winning.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for a missing order,
    /// [`AppError::InvalidState`] for an illegal transition, and
    /// [`AppError::Conflict`] if the status moved concurrently.
    pub async fn set_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, AppError> {
        let order = self
            .store
            .order_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("order not found".to_owned()))?;

        if !order.status.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "cannot move order from {} to {next}",
                order.status
            )));
        }

        let updated = self.store.set_order_status(id, order.status, next).await?;
        tracing::info!(order_id = %id, from = %order.status, to = %next, "order status changed");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clove_core::{Email, Role};

    use crate::models::{NewProduct, NewUser, User};
    use crate::store::memory::MemoryStore;

    use super::*;

    fn principal_for(user: &User) -> Principal {
        Principal {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    async fn seed_user(store: &MemoryStore, email: &str, role: Role) -> User {
        store
            .create_user(NewUser {
                name: "Test".to_owned(),
                email: Email::parse(email).unwrap(),
                password_hash: "hash".to_owned(),
                role,
            })
            .await
            .unwrap()
    }

    async fn seed_product(store: &MemoryStore) -> crate::models::Product {
        let category = store.create_category("tools", None).await.unwrap();
        store
            .create_product(NewProduct {
                name: "wrench".to_owned(),
                description: None,
                price: "19.99".parse().unwrap(),
                category_id: category.id,
                image_url: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_admins_cannot_checkout() {
        let store = MemoryStore::new();
        let admin = seed_user(&store, "admin@example.com", Role::Admin).await;
        let product = seed_product(&store).await;
        store.add_cart_line(admin.id, product.id, 1).await.unwrap();

        let service = OrderService::new(&store);
        assert!(matches!(
            service.checkout(&principal_for(&admin)).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_orders_do_not_leak_across_users() {
        let store = MemoryStore::new();
        let ada = seed_user(&store, "ada@example.com", Role::User).await;
        let bob = seed_user(&store, "bob@example.com", Role::User).await;
        let admin = seed_user(&store, "admin@example.com", Role::Admin).await;
        let product = seed_product(&store).await;
        store.add_cart_line(ada.id, product.id, 1).await.unwrap();

        let service = OrderService::new(&store);
        let order = service.checkout(&principal_for(&ada)).await.unwrap();

        assert!(service.order(&principal_for(&ada), order.id).await.is_ok());
        assert!(service.order(&principal_for(&admin), order.id).await.is_ok());
        assert!(matches!(
            service.order(&principal_for(&bob), order.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_illegal_transition_is_rejected_before_the_store() {
        let store = MemoryStore::new();
        let ada = seed_user(&store, "ada@example.com", Role::User).await;
        let product = seed_product(&store).await;
        store.add_cart_line(ada.id, product.id, 1).await.unwrap();

        let service = OrderService::new(&store);
        let order = service.checkout(&principal_for(&ada)).await.unwrap();

        // Pending cannot jump straight to delivered.
        assert!(matches!(
            service.set_status(order.id, OrderStatus::Delivered).await,
            Err(AppError::InvalidState(_))
        ));

        let order = service
            .set_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        // Cancelled is terminal.
        service
            .set_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(
            service.set_status(order.id, OrderStatus::Processing).await,
            Err(AppError::InvalidState(_))
        ));
    }
}
