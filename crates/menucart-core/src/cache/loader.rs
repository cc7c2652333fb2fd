//! Category loading for menu views.
//!
//! Wraps [`SwrCache`] around a [`CatalogSource`]: fresh sections come from
//! storage, stale ones are refetched once no matter how many views ask, and
//! mounted views can keep a periodic revalidation running in the background.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::clock::Clock;
use super::error::{FetchError, LoadError};
use super::swr::{CacheSettings, Loaded, SwrCache};
use crate::catalog::{sort_categories, CatalogSource};
use crate::models::Category;
use crate::storage::KeyValueStore;

pub type CategoryList = Vec<Category>;

/// Outcome of one background revalidation, sent to the mounted view.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Updated {
        section: String,
        loaded: Loaded<CategoryList>,
    },
    Failed {
        section: String,
        error: FetchError,
    },
}

/// Keeps a periodic refresh alive. Dropping it stops the task, so a view
/// that goes away never receives a late response.
#[derive(Debug)]
pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn stop(self) {}
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct CategoryLoader<C, S> {
    source: Arc<C>,
    cache: SwrCache<CategoryList, S>,
}

impl<C, S> Clone for CategoryLoader<C, S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
        }
    }
}

impl<C, S> CategoryLoader<C, S>
where
    C: CatalogSource + 'static,
    S: KeyValueStore + 'static,
{
    pub fn new(source: C, store: S, settings: CacheSettings) -> Self {
        Self {
            source: Arc::new(source),
            cache: SwrCache::new(store, settings),
        }
    }

    pub fn with_clock(source: C, store: S, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            source: Arc::new(source),
            cache: SwrCache::with_clock(store, settings, clock),
        }
    }

    /// Storage key of a section's cached categories.
    pub fn cache_key(section: &str) -> String {
        format!("categories-{}", section)
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn cache(&self) -> &SwrCache<CategoryList, S> {
        &self.cache
    }

    /// Categories of `section`, sorted for display. Served from storage when
    /// fresh, otherwise fetched.
    pub async fn load(&self, section: &str) -> Result<Loaded<CategoryList>, LoadError<CategoryList>> {
        let source = Arc::clone(&self.source);
        let owned = section.to_string();
        self.cache
            .load(&Self::cache_key(section), move || async move {
                source.fetch_categories(&owned).await.map(sort_categories)
            })
            .await
    }

    /// Fetch `section` even if the cached copy is fresh.
    pub async fn revalidate(
        &self,
        section: &str,
    ) -> Result<Loaded<CategoryList>, LoadError<CategoryList>> {
        let source = Arc::clone(&self.source);
        let owned = section.to_string();
        self.cache
            .revalidate(&Self::cache_key(section), move || async move {
                source.fetch_categories(&owned).await.map(sort_categories)
            })
            .await
    }

    /// Whatever is known about `section` right now, without fetching.
    pub fn peek(&self, section: &str) -> Option<Loaded<CategoryList>> {
        self.cache.peek(&Self::cache_key(section))
    }

    /// Revalidate `section` every refresh interval until the handle is dropped
    /// or the receiver goes away. The first refresh happens one interval from now.
    pub fn spawn_periodic_refresh(
        &self,
        section: &str,
        tx: mpsc::Sender<RefreshEvent>,
    ) -> RefreshHandle {
        let loader = self.clone();
        let section = section.to_string();
        let period = self.cache.settings().refresh_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                info!(section = %section, "Periodic category refresh");

                let event = match loader.revalidate(&section).await {
                    Ok(loaded) => {
                        debug!(section = %section, count = loaded.data.len(), "Periodic refresh succeeded");
                        RefreshEvent::Updated {
                            section: section.clone(),
                            loaded,
                        }
                    }
                    Err(e) => {
                        error!(section = %section, error = %e, "Periodic refresh failed");
                        RefreshEvent::Failed {
                            section: section.clone(),
                            error: e.error,
                        }
                    }
                };

                if tx.send(event).await.is_err() {
                    debug!(section = %section, "Refresh receiver dropped, stopping");
                    break;
                }
            }
        });

        RefreshHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::swr::Origin;
    use crate::catalog::{StaticCatalogSource, BEST_SELLERS};
    use crate::storage::MemoryStore;
    use chrono::{DateTime, TimeDelta, Utc};
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn category(name: &str) -> Category {
        Category {
            id: None,
            name: name.to_string(),
            visible: true,
            products: Vec::new(),
        }
    }

    fn menu() -> Vec<Category> {
        vec![category("Zebra"), category(BEST_SELLERS), category("Apple")]
    }

    fn loader(
        source: StaticCatalogSource,
        store: MemoryStore,
        clock: &ManualClock,
    ) -> CategoryLoader<StaticCatalogSource, MemoryStore> {
        CategoryLoader::with_clock(source, store, CacheSettings::default(), Arc::new(clock.clone()))
    }

    fn names(loaded: &Loaded<CategoryList>) -> Vec<String> {
        loaded.data.iter().map(|c| c.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_load_sorts_and_caches_under_section_key() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(t0());
        let loader = loader(StaticCatalogSource::new(menu()), store.clone(), &clock);

        let loaded = loader.load("main").await.unwrap();
        assert_eq!(names(&loaded), vec![BEST_SELLERS, "Apple", "Zebra"]);
        assert!(store.contains_key("categories-main"));
        assert!(store.contains_key("categories-main-timestamp"));

        // Fresh: a remount within the hour does not touch the network
        let again = loader.load("main").await.unwrap();
        assert_eq!(again.origin, Origin::Cache);
        assert_eq!(loader.source().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_make_one_network_call() {
        let clock = ManualClock::new(t0());
        let source = StaticCatalogSource::new(menu()).with_delay(Duration::from_millis(300));
        let loader = loader(source, MemoryStore::new(), &clock);

        let (a, b) = tokio::join!(loader.load("main"), loader.load("main"));
        assert_eq!(loader.source().calls(), 1);
        assert_eq!(names(&a.unwrap()), names(&b.unwrap()));
    }

    #[tokio::test]
    async fn test_different_sections_fetch_independently() {
        let clock = ManualClock::new(t0());
        let loader = loader(StaticCatalogSource::new(menu()), MemoryStore::new(), &clock);

        loader.load("lunch").await.unwrap();
        loader.load("dinner").await.unwrap();
        assert_eq!(loader.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_rendered_data() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(t0());
        let loader = loader(StaticCatalogSource::new(menu()), store.clone(), &clock);
        loader.load("main").await.unwrap();

        clock.advance(TimeDelta::hours(1) + TimeDelta::seconds(1));
        loader.source().set_failing(true);

        let err = loader.load("main").await.unwrap_err();
        let previous = err.previous.expect("stale data is still shown");
        assert_eq!(previous.data.len(), 3);
        assert!(loader.peek("main").is_some());
        assert!(store.contains_key("categories-main"));

        // Retry succeeds once the backend is back
        loader.source().set_failing(false);
        loader.source().set_categories(vec![category("Soups")]);
        let loaded = loader.load("main").await.unwrap();
        assert_eq!(names(&loaded), vec!["Soups"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_delivers_updates_until_dropped() {
        let clock = ManualClock::new(t0());
        let settings = CacheSettings {
            refresh_interval: Duration::from_secs(60 * 60),
            ..CacheSettings::default()
        };
        let loader = CategoryLoader::with_clock(
            StaticCatalogSource::new(menu()),
            MemoryStore::new(),
            settings,
            Arc::new(clock.clone()),
        );
        let (tx, mut rx) = mpsc::channel(4);

        let handle = loader.spawn_periodic_refresh("main", tx);

        let first = rx.recv().await.expect("first refresh");
        assert!(matches!(first, RefreshEvent::Updated { ref section, .. } if section == "main"));
        assert_eq!(loader.source().calls(), 1);

        // Move past the de-dup window so the next tick goes to the network
        clock.advance(TimeDelta::hours(1));
        loader.source().set_failing(true);
        let second = rx.recv().await.expect("second refresh");
        assert!(matches!(second, RefreshEvent::Failed { .. }));
        assert_eq!(loader.source().calls(), 2);

        drop(handle);
        assert!(rx.recv().await.is_none());
    }
}
