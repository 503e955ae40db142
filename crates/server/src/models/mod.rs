//! Domain models for the pickup service.
//!
//! These types represent validated domain objects separate from database row
//! types (see `db::tokens::TokenRow`).

pub mod shop;
pub mod token;

pub use shop::Shop;
pub use token::{IssuedToken, ShopSummary, Token};
