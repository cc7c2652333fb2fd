//! Command handlers for the menucart CLI.
//!
//! `App` owns the loaded configuration and the on-disk store shared by the
//! cart and the category cache. The catalog loader is only built for
//! commands that talk to the backend.

use anyhow::{anyhow, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use menucart_core::cache::CategoryList;
use menucart_core::catalog::visible_categories;
use menucart_core::models::find_product;
use menucart_core::utils::{format_price, truncate_string};
use menucart_core::{
    CartStore, Category, CategoryLoader, Config, CredentialStore, FileStore, HttpCatalogSource,
    ItemId, LoadError, Loaded, NewCartItem, Origin, Product, RefreshEvent,
};

/// Buffer size for periodic refresh events.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum width of a product name in the menu listing.
const NAME_WIDTH: usize = 32;

type Loader = CategoryLoader<HttpCatalogSource, FileStore>;

pub struct App {
    config: Config,
    store: FileStore,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let store = FileStore::new(config.data_dir()?)?;
        debug!(dir = %store.dir().display(), "Using data directory");
        Ok(Self { config, store })
    }

    pub fn set_api_key(key: &str) -> Result<()> {
        CredentialStore::store_api_key(key)?;
        println!("API key stored in keychain.");
        Ok(())
    }

    /// Point the config file at a catalog backend.
    pub fn set_catalog_url(url: &str) -> Result<()> {
        // Fail early on a URL the client would reject
        HttpCatalogSource::new(url)?;

        let mut config = Config::load()?;
        config.catalog_url = Some(url.to_string());
        config.save()?;
        info!(url = %url, "Saved catalog URL");
        println!("Catalog URL saved.");
        Ok(())
    }

    pub fn clear_api_key() -> Result<()> {
        CredentialStore::delete_api_key()?;
        println!("API key removed.");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Menu
    // ------------------------------------------------------------------------

    pub async fn show_menu(&self, section: Option<&str>) -> Result<()> {
        let section = self.section(section);
        let loaded = settle(self.loader()?.load(section).await)?;
        self.print_menu(section, &loaded);
        Ok(())
    }

    pub async fn refresh(&self, section: Option<&str>) -> Result<()> {
        let section = self.section(section);
        let loaded = settle(self.loader()?.revalidate(section).await)?;
        self.print_menu(section, &loaded);
        Ok(())
    }

    /// Show the menu, then keep it revalidated until Ctrl+C.
    pub async fn watch(&self, section: Option<&str>) -> Result<()> {
        let section = self.section(section);
        let loader = self.loader()?;

        let loaded = settle(loader.load(section).await)?;
        self.print_menu(section, &loaded);

        let (tx, mut rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let handle = loader.spawn_periodic_refresh(section, tx);
        info!(section = %section, "Watching for menu changes");
        eprintln!(
            "Refreshing every {} minute(s). Press Ctrl+C to stop.",
            self.config.cache_settings().refresh_interval.as_secs() / 60
        );

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(RefreshEvent::Updated { section, loaded }) => self.print_menu(&section, &loaded),
                    Some(RefreshEvent::Failed { section, error }) => {
                        eprintln!("Refresh of '{}' failed: {}", section, error);
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping refresh");
                    break;
                }
            }
        }

        handle.stop();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Cart
    // ------------------------------------------------------------------------

    pub fn show_cart(&self) -> Result<()> {
        let cart = self.cart();
        if cart.is_empty() {
            println!("Cart is empty.");
            return Ok(());
        }

        for line in cart.lines() {
            println!(
                "{:>15}  {:<width$}  {:>4} x {:>10}  {:>10}",
                line.id,
                truncate_string(&line.name, NAME_WIDTH),
                line.quantity,
                format_price(line.price),
                format_price(line.line_total()),
                width = NAME_WIDTH,
            );
        }
        println!(
            "Total: {} item(s), {}",
            cart.total_items(),
            format_price(cart.total_price())
        );
        Ok(())
    }

    pub fn cart_add(&self, name: &str, price: Option<Decimal>, image: Option<&str>) -> Result<()> {
        let mut item = NewCartItem::named(name);
        if let Some(price) = price {
            item = item.with_price(price);
        }
        if let Some(image) = image {
            item = item.with_image(image);
        }

        let mut cart = self.cart();
        let id = cart.add_to_cart(item);
        self.print_line(&cart, &id.to_string())
    }

    pub async fn cart_add_product(&self, product_id: &str, section: Option<&str>) -> Result<()> {
        let section = self.section(section);
        let loaded = settle(self.loader()?.load(section).await)?;
        let product = lookup_product(&loaded.data, product_id)
            .ok_or_else(|| anyhow!("No product '{}' in section '{}'", product_id, section))?;

        let mut cart = self.cart();
        let id = cart.add_to_cart(NewCartItem::from(product));
        self.print_line(&cart, &id.to_string())
    }

    pub fn cart_adjust(&self, line_id: &str, delta: i64) -> Result<()> {
        let mut cart = self.cart();
        let id = cart
            .resolve_id(line_id)
            .ok_or_else(|| anyhow!("No cart line '{}'", line_id))?;
        cart.update_quantity(&id, delta);
        self.print_line(&cart, line_id)
    }

    pub fn cart_remove(&self, line_id: &str) -> Result<()> {
        let mut cart = self.cart();
        let id = cart
            .resolve_id(line_id)
            .ok_or_else(|| anyhow!("No cart line '{}'", line_id))?;
        cart.remove_item(&id);
        println!("Removed {}.", line_id);
        Ok(())
    }

    pub fn cart_clear(&self) -> Result<()> {
        self.cart().clear_cart();
        println!("Cart cleared.");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn section<'a>(&'a self, section: Option<&'a str>) -> &'a str {
        section.unwrap_or(&self.config.section)
    }

    fn cart(&self) -> CartStore<FileStore> {
        CartStore::open(self.store.clone(), self.config.cart_config())
    }

    fn loader(&self) -> Result<Loader> {
        let url = self.config.catalog_url.as_deref().ok_or_else(|| {
            anyhow!("No catalog URL configured. Set MENUCART_CATALOG_URL or catalog_url in config.json")
        })?;

        let mut source = HttpCatalogSource::new(url)?;
        match CredentialStore::api_key() {
            Ok(Some(key)) => source = source.with_api_key(key),
            Ok(None) => debug!("No API key stored, using anonymous access"),
            Err(e) => warn!(error = %e, "Could not read API key, using anonymous access"),
        }

        Ok(CategoryLoader::new(
            source,
            self.store.clone(),
            self.config.cache_settings(),
        ))
    }

    fn print_line(&self, cart: &CartStore<FileStore>, line_id: &str) -> Result<()> {
        let id = cart
            .resolve_id(line_id)
            .ok_or_else(|| anyhow!("No cart line '{}'", line_id))?;
        if let Some(line) = cart.line(&id) {
            println!(
                "{} x{} ({}). Cart: {} item(s), {}",
                line.name,
                line.quantity,
                format_price(line.line_total()),
                cart.total_items(),
                format_price(cart.total_price())
            );
        }
        Ok(())
    }

    fn print_menu(&self, section: &str, loaded: &Loaded<CategoryList>) {
        let source = match loaded.origin {
            Origin::Cache => "cached",
            Origin::Network => "fetched",
        };
        println!(
            "== {} ({}, {}) ==",
            section,
            source,
            loaded.age_display(Utc::now())
        );

        for category in visible_categories(&loaded.data) {
            println!("\n{}", category.name);
            for product in &category.products {
                let id = product
                    .id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:>15}  {:<width$}  {:>10}",
                    id,
                    truncate_string(&product.name, NAME_WIDTH),
                    format_price(product.price),
                    width = NAME_WIDTH,
                );
            }
        }
    }
}

/// Keep showing what we had when a fetch fails; only error out when there is
/// nothing at all to show.
fn settle(result: Result<Loaded<CategoryList>, LoadError<CategoryList>>) -> Result<Loaded<CategoryList>> {
    match result {
        Ok(loaded) => Ok(loaded),
        Err(LoadError {
            error,
            previous: Some(previous),
        }) => {
            warn!(error = %error, "Fetch failed, showing last known menu");
            eprintln!("Warning: {} (showing last known menu)", error);
            Ok(previous)
        }
        Err(e) => Err(anyhow::Error::new(e.error)),
    }
}

/// Find a product by the id as typed. Numeric input matches numeric ids
/// first, then string ids with the same text.
fn lookup_product<'a>(categories: &'a [Category], raw: &str) -> Option<&'a Product> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|n| find_product(categories, &ItemId::Number(n)))
        .or_else(|| find_product(categories, &ItemId::from(raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use menucart_core::cache::FetchError;

    fn menu(name: &str) -> Loaded<CategoryList> {
        let categories: CategoryList = serde_json::from_str(&format!(
            r#"[{{"name": "{}", "products": [{{"id": 12, "name": "Tea"}}, {{"id": "12", "name": "Text Tea"}}, {{"id": "p-7", "name": "Kebab"}}]}}]"#,
            name
        ))
        .unwrap();
        Loaded {
            data: std::sync::Arc::new(categories),
            origin: Origin::Cache,
            fetched_at: Utc::now(),
        }
    }

    fn fetch_error() -> FetchError {
        FetchError::new("categories-main", std::io::Error::other("offline"))
    }

    #[test]
    fn test_settle_passes_success_through() {
        let loaded = settle(Ok(menu("Fresh"))).unwrap();
        assert_eq!(loaded.data[0].name, "Fresh");
    }

    #[test]
    fn test_settle_falls_back_to_previous_menu() {
        let result = Err(LoadError {
            error: fetch_error(),
            previous: Some(menu("Stale")),
        });
        let loaded = settle(result).unwrap();
        assert_eq!(loaded.data[0].name, "Stale");
        assert_eq!(loaded.origin, Origin::Cache);
    }

    #[test]
    fn test_settle_errors_without_previous_menu() {
        let result: Result<Loaded<CategoryList>, LoadError<CategoryList>> = Err(LoadError {
            error: fetch_error(),
            previous: None,
        });
        let err = settle(result).unwrap_err();
        assert!(err.to_string().contains("categories-main"));
    }

    #[test]
    fn test_lookup_product() {
        let loaded = menu("Drinks");
        assert_eq!(lookup_product(&loaded.data, "12").unwrap().name, "Tea");
        assert_eq!(lookup_product(&loaded.data, " p-7 ").unwrap().name, "Kebab");
        assert!(lookup_product(&loaded.data, "99").is_none());
    }
}
