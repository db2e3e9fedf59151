//! Domain services.
//!
//! Services sit between route handlers and the [`crate::store::Store`]:
//! handlers decode the request and authenticate, services own validation and
//! business rules, the store owns persistence and atomicity.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
