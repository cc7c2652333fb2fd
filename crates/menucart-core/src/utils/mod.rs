//! Utility functions for string formatting and ordering.

pub mod format;

pub use format::{collation_key, format_price, normalize_arabic, truncate_string};
