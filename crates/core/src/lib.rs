//! Clove Core - Shared types library.
//!
//! This crate provides the common vocabulary used across the Clove backend:
//! typed entity IDs, validated email addresses, user roles, and the order
//! status lifecycle.
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP.
//! The optional `postgres` feature adds `sqlx` encode/decode implementations
//! so the types can flow straight through queries.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
