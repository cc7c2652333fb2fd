//! HTTP client for the catalog backend.
//!
//! The backend exposes each menu section's categories as a JSON document at
//! `{base_url}/sections/{section}/categories`. An API key, when configured,
//! is sent as a bearer token.

use std::time::Duration;

use reqwest::{header, Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CatalogError, CatalogSource};
use crate::models::Category;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Either a bare array or an envelope, depending on how the collection is exported.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoriesResponse {
    List(Vec<Category>),
    Wrapped { categories: Vec<Category> },
}

/// Catalog source backed by the remote document store.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpCatalogSource {
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CatalogError::InvalidResponse(format!("Invalid catalog URL: {}", e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: None,
        })
    }

    /// Create a copy that authenticates with `api_key`, sharing the connection pool.
    pub fn with_api_key(&self, api_key: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: Some(api_key),
        }
    }

    pub fn categories_url(&self, section: &str) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                CatalogError::InvalidResponse(format!(
                    "Catalog URL cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["sections", section, "categories"]);
        Ok(url)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, CatalogError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(CatalogError::from_status(status, &body))
        }
    }

    async fn get_text(&self, url: Url) -> Result<String, CatalogError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .header(header::ACCEPT, "application/json");
            if let Some(ref key) = self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response.text().await?),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(CatalogError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }
}

/// Parse a categories document in either of its two shapes.
pub fn parse_categories(body: &str) -> Result<Vec<Category>, CatalogError> {
    let parsed: CategoriesResponse = serde_json::from_str(body)
        .map_err(|e| CatalogError::InvalidResponse(format!("Failed to parse categories: {}", e)))?;
    Ok(match parsed {
        CategoriesResponse::List(categories) => categories,
        CategoriesResponse::Wrapped { categories } => categories,
    })
}

impl CatalogSource for HttpCatalogSource {
    async fn fetch_categories(&self, section: &str) -> Result<Vec<Category>, CatalogError> {
        let url = self.categories_url(section)?;
        debug!(url = %url, "Fetching categories");
        let body = self.get_text(url).await?;
        let categories = parse_categories(&body)?;
        debug!(section = section, count = categories.len(), "Categories fetched");
        Ok(categories)
    }
}
