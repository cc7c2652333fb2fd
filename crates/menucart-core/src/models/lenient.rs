//! Forgiving deserializers for documents coming from the catalog backend
//! and from browser-style storage.
//!
//! Catalog documents are hand-edited in an admin dashboard, so numbers show
//! up as strings, fields go missing, and `null` appears where text is
//! expected. None of that is allowed to fail a whole payload.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce an arbitrary JSON value into a non-negative price.
///
/// Numbers and numeric strings are accepted. Anything else, including
/// negative amounts, becomes zero.
pub fn coerce_price(value: &Value) -> Decimal {
    let parsed = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };

    match parsed {
        Some(price) if !price.is_sign_negative() => price,
        _ => Decimal::ZERO,
    }
}

/// Clamp a programmatically supplied price to zero or above.
pub fn clamp_price(price: Decimal) -> Decimal {
    price.max(Decimal::ZERO)
}

/// `deserialize_with` target for required price fields.
pub fn price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(coerce_price).unwrap_or_default())
}

/// `deserialize_with` target for optional price fields. `null` stays `None`.
pub fn optional_price<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.is_null())
        .as_ref()
        .map(coerce_price))
}

/// `deserialize_with` target for text fields. `null` and non-string scalars
/// are accepted; objects and arrays collapse to an empty string.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_string).unwrap_or_default())
}

/// Like [`text`] but keeps absence distinguishable.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_string))
}

/// Optional numeric field that may arrive as a number or a numeric string.
pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    })
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
