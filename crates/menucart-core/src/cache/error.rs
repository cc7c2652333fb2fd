use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::swr::Loaded;

/// A fetch that failed. Cloneable so one failure can be handed to every
/// caller that joined the same de-duplicated request.
#[derive(Error, Debug, Clone)]
#[error("Failed to fetch `{key}`: {source}")]
pub struct FetchError {
    pub key: String,
    pub source: Arc<dyn StdError + Send + Sync>,
}

impl FetchError {
    pub fn new<E>(key: &str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            key: key.to_string(),
            source: Arc::new(source),
        }
    }
}

/// A failed load. Whatever was shown before the failure is still available
/// in `previous`, so callers can keep rendering it next to a retry control.
#[derive(Debug, Clone)]
pub struct LoadError<T> {
    pub error: FetchError,
    pub previous: Option<Loaded<T>>,
}

impl<T> fmt::Display for LoadError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T: fmt::Debug> StdError for LoadError<T> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}
