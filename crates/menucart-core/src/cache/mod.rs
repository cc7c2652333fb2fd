//! Local caching for catalog data.
//!
//! `SwrCache` is a stale-while-revalidate cache over any `KeyValueStore`:
//! entries are persisted as a JSON payload plus a sibling timestamp key and
//! considered stale after 60 minutes. Concurrent requests for one key share a
//! single fetch for 60 seconds.
//!
//! `CategoryLoader` specializes it for menu sections and adds periodic
//! background refresh for mounted views.

pub mod clock;
pub mod entry;
pub mod error;
pub mod loader;
pub mod swr;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CachedData;
pub use error::{FetchError, LoadError};
pub use loader::{CategoryList, CategoryLoader, RefreshEvent, RefreshHandle};
pub use swr::{CacheSettings, Loaded, Origin, SwrCache};
