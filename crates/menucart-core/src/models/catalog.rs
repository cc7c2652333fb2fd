//! Catalog documents as returned by the backend.
//!
//! The schema belongs to the document database, not to us. Every field is
//! optional on the wire and defaulted here so one malformed product never
//! hides a whole category.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::ItemId;
use super::lenient;

/// A menu section with its products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(from = "CategoryDocument")]
pub struct Category {
    pub id: Option<ItemId>,
    pub name: String,
    pub visible: bool,
    pub products: Vec<Product>,
}

impl Category {
    pub fn find_product(&self, id: &ItemId) -> Option<&Product> {
        self.products.iter().find(|p| p.id.as_ref() == Some(id))
    }
}

/// A single dish or item for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(from = "ProductDocument")]
pub struct Product {
    pub id: Option<ItemId>,
    pub name: String,
    pub description: String,
    pub image: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub price: Decimal,
    pub width: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub rating: Option<f64>,
}

/// First non-blank of the canonical field and its legacy spelling.
fn either_text(primary: Option<String>, legacy: Option<String>) -> String {
    primary
        .filter(|s| !s.trim().is_empty())
        .or(legacy)
        .unwrap_or_default()
}

/// Wire shape of a category. Old documents use `title` and `isVisible`;
/// some carry both spellings, so each is read on its own and merged.
#[derive(Deserialize)]
struct CategoryDocument {
    #[serde(default)]
    id: Option<ItemId>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    title: Option<String>,
    #[serde(default)]
    visible: Option<bool>,
    #[serde(default, rename = "isVisible")]
    is_visible: Option<bool>,
    #[serde(default)]
    products: Option<Vec<Product>>,
}

impl From<CategoryDocument> for Category {
    fn from(doc: CategoryDocument) -> Self {
        Self {
            id: doc.id,
            name: either_text(doc.name, doc.title),
            visible: doc.visible.or(doc.is_visible).unwrap_or(true),
            products: doc.products.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct ProductDocument {
    #[serde(default)]
    id: Option<ItemId>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    description: String,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    image: Option<String>,
    #[serde(default, rename = "imageUrl", deserialize_with = "lenient::optional_text")]
    image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::price")]
    price: Decimal,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    width: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    height: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    weight: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    rating: Option<f64>,
}

impl From<ProductDocument> for Product {
    fn from(doc: ProductDocument) -> Self {
        Self {
            id: doc.id,
            name: either_text(doc.name, doc.title),
            description: doc.description,
            image: either_text(doc.image, doc.image_url),
            price: doc.price,
            width: doc.width,
            height: doc.height,
            weight: doc.weight,
            rating: doc.rating,
        }
    }
}

/// Find a product anywhere in a list of categories.
pub fn find_product<'a>(categories: &'a [Category], id: &ItemId) -> Option<&'a Product> {
    categories.iter().find_map(|c| c.find_product(id))
}
