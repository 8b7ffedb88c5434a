//! Products as published by the remote catalog API.
//!
//! The API returns loosely-typed JSON objects. [`RawProduct`] mirrors that
//! shape and [`ExternalProduct`] is the validated form everything else works
//! with; conversion happens once, at the system boundary.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::sku::Sku;

/// Reasons a remote product is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("product id is missing")]
    MissingId,
    #[error("product id must be a positive integer (got {0})")]
    InvalidId(String),
    #[error("product title is missing or blank")]
    MissingTitle,
    #[error("product price is missing")]
    MissingPrice,
    #[error("product price must be a non-negative number (got {0})")]
    InvalidPrice(String),
    #[error("product image is not an absolute http(s) URL: {0}")]
    InvalidImageUrl(String),
}

/// A product object exactly as decoded from the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProduct {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// A validated remote product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProduct {
    /// Remote product ID (always positive).
    pub id: u64,
    pub title: String,
    pub price: Decimal,
    /// Empty when the API omits it.
    pub description: String,
    pub image: Option<Url>,
}

impl ExternalProduct {
    /// The SKU used for this product's local catalog record.
    #[must_use]
    pub fn sku(&self) -> Sku {
        Sku::from_external_id(self.id)
    }
}

impl TryFrom<RawProduct> for ExternalProduct {
    type Error = ProductError;

    fn try_from(raw: RawProduct) -> Result<Self, Self::Error> {
        let id = parse_id(raw.id.ok_or(ProductError::MissingId)?)?;

        let title = raw
            .title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(ProductError::MissingTitle)?;

        let price = parse_price(raw.price.ok_or(ProductError::MissingPrice)?)?;

        let image = match raw.image.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_image_url(s)?),
        };

        Ok(Self {
            id,
            title,
            price,
            description: raw.description.unwrap_or_default(),
            image,
        })
    }
}

fn parse_id(value: Value) -> Result<u64, ProductError> {
    let id = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ProductError::InvalidId(value.to_string())),
    }
}

fn parse_price(value: Value) -> Result<Decimal, ProductError> {
    let text = match &value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return Err(ProductError::InvalidPrice(value.to_string())),
    };
    let price = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ProductError::InvalidPrice(value.to_string()))?;
    if price.is_sign_negative() {
        return Err(ProductError::InvalidPrice(value.to_string()));
    }
    Ok(price.normalize())
}

/// Parse an absolute `http`/`https` image URL.
///
/// # Errors
///
/// Returns [`ProductError::InvalidImageUrl`] for relative URLs and other schemes.
pub fn parse_image_url(s: &str) -> Result<Url, ProductError> {
    let url = Url::parse(s).map_err(|_| ProductError::InvalidImageUrl(s.to_owned()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(ProductError::InvalidImageUrl(s.to_owned())),
    }
}
