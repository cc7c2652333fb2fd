//! Catalog backend boundary.
//!
//! `CatalogSource` is the read-only view of the document database that
//! holds menu categories. `HttpCatalogSource` talks to the real backend;
//! `StaticCatalogSource` serves a fixed catalog for tests and offline use.
//! Ordering rules for the menu live in `ordering`.

pub mod client;
pub mod error;
pub mod ordering;
pub mod source;

pub use client::{parse_categories, HttpCatalogSource};
pub use error::CatalogError;
pub use ordering::{is_best_sellers, sort_categories, visible_categories, BEST_SELLERS};
pub use source::{CatalogSource, StaticCatalogSource};
