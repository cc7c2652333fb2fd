//! Data models for the storefront.
//!
//! - `CartLine`, `NewCartItem`, `ItemId`: shopping cart entries
//! - `Category`, `Product`: catalog documents from the backend
//! - `lenient`: forgiving deserializers shared by both

pub mod cart;
pub mod catalog;
pub mod lenient;

pub use cart::{CartLine, ItemId, NewCartItem};
pub use catalog::{find_product, Category, Product};
