use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::CatalogError;
use crate::models::Category;

/// Read side of the catalog backend.
pub trait CatalogSource: Send + Sync {
    /// Fetch every category (with embedded products) of a menu section.
    fn fetch_categories(
        &self,
        section: &str,
    ) -> impl Future<Output = Result<Vec<Category>, CatalogError>> + Send;
}

/// Fixed in-memory catalog. Counts calls and can be switched into a failing
/// mode, which makes it the fake of choice for loader tests and offline demos.
#[derive(Debug, Default)]
pub struct StaticCatalogSource {
    categories: Mutex<Vec<Category>>,
    delay: Option<Duration>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticCatalogSource {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories: Mutex::new(categories),
            ..Self::default()
        }
    }

    /// Make every fetch take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_categories(&self, categories: Vec<Category>) {
        *self.categories.lock().unwrap_or_else(PoisonError::into_inner) = categories;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CatalogSource for StaticCatalogSource {
    async fn fetch_categories(&self, section: &str) -> Result<Vec<Category>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(format!(
                "section {} is offline",
                section
            )));
        }
        Ok(self
            .categories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
