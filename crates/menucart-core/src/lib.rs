//! Core library for menucart - a restaurant storefront's client-side state.
//!
//! - `cart`: the shopping cart store, its events and the badge pulse
//! - `cache`: stale-while-revalidate caching and the category loader
//! - `catalog`: the catalog backend boundary and menu ordering
//! - `storage`: local-storage style key-value persistence
//! - `models`: cart lines, categories and products
//! - `config`, `credentials`: application settings and the API key

pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod models;
pub mod storage;
pub mod utils;

pub use cache::{CacheSettings, CategoryLoader, Loaded, LoadError, Origin, RefreshEvent, RefreshHandle};
pub use cart::{BadgePulse, CartConfig, CartEvent, CartSnapshot, CartStore, MergeKey};
pub use catalog::{CatalogError, CatalogSource, HttpCatalogSource, StaticCatalogSource};
pub use config::Config;
pub use credentials::CredentialStore;
pub use models::{CartLine, Category, ItemId, NewCartItem, Product};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
