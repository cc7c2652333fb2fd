//! Shopping cart state.
//!
//! `CartStore` keeps the ordered line list, derives totals and writes every
//! change through to storage under a single key. UI effects are decoupled:
//! the store only emits `CartEvent`s, and `BadgePulse` turns pulses into the
//! short-lived highlight flag the cart icon animates on.

pub mod pulse;
pub mod store;

pub use pulse::{BadgePulse, PULSE_DURATION};
pub use store::{
    CartConfig, CartEvent, CartSnapshot, CartStore, MergeKey, CART_STORAGE_KEY,
    DEFAULT_PLACEHOLDER_IMAGE, DEFAULT_PLACEHOLDER_NAME,
};
