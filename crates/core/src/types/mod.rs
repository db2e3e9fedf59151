//! Shared domain types.

mod email;
mod id;
mod role;
mod status;

pub use email::{Email, EmailError};
pub use role::Role;
pub use status::OrderStatus;

pub use id::{CategoryId, OrderId, ProductId, UserId};
