//! Local catalog records and imported media.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use catalog_bridge_core::{CatalogRecordId, CurrencyCode, ExternalProduct, MediaId, Price, Sku};

/// A product in the local catalog, keyed by SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub id: CatalogRecordId,
    pub sku: Sku,
    /// URL slug, unique across records.
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: Price,
    /// Primary image, if one has been attached.
    pub thumbnail: Option<Thumbnail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// Public path of the record's detail page.
    #[must_use]
    pub fn permalink(&self) -> String {
        format!("/products/{}", self.slug)
    }
}

/// The attached primary image of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub media_id: MediaId,
    pub url: String,
}

/// Fields written when a record is created or refreshed from the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCatalogRecord {
    pub sku: Sku,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,
}

impl NewCatalogRecord {
    /// Build the record fields for a remote product.
    ///
    /// The slug carries the SKU so two products with the same title never
    /// collide. The price is rounded half away from zero to whole cents.
    #[must_use]
    pub fn from_external(product: &ExternalProduct) -> Self {
        let sku = product.sku();
        let base = slugify(&product.title);
        let slug = if base.is_empty() {
            format!("product-{sku}")
        } else {
            format!("{base}-{sku}")
        };

        Self {
            slug,
            title: product.title.clone(),
            description: product.description.clone(),
            price: product
                .price
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            sku,
        }
    }

    /// Price in the store currency.
    #[must_use]
    pub const fn price(&self) -> Price {
        Price::new(self.price, CurrencyCode::USD)
    }
}

/// An imported image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub id: MediaId,
    /// Where the image was downloaded from; unique.
    pub source_url: String,
    /// URL the image is served from.
    pub public_url: String,
    /// Path of the stored file.
    pub file_path: String,
    pub mime_type: String,
    pub byte_size: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields for registering a downloaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaItem {
    pub source_url: String,
    pub public_url: String,
    pub file_path: String,
    pub mime_type: String,
    pub byte_size: i64,
}

const MAX_SLUG_LEN: usize = 80;

/// Lowercase ASCII slug: alphanumerics kept, everything else collapsed to
/// single hyphens, capped at 80 characters.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if !c.is_ascii_alphanumeric() {
            pending_hyphen = true;
            continue;
        }
        let hyphen = pending_hyphen && !slug.is_empty();
        if slug.len() + usize::from(hyphen) + 1 > MAX_SLUG_LEN {
            break;
        }
        if hyphen {
            slug.push('-');
        }
        pending_hyphen = false;
        slug.push(c.to_ascii_lowercase());
    }

    slug
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("Fjallraven - Foldsack No. 1 Backpack, Fits 15 Laptops"),
            "fjallraven-foldsack-no-1-backpack-fits-15-laptops"
        );
        assert_eq!(slugify("  --Mens Casual-- "), "mens-casual");
        assert_eq!(slugify("¡¿!"), "");
    }

    #[test]
    fn test_slug_is_capped() {
        assert!(slugify(&"word ".repeat(40)).len() <= 80);
    }

    #[test]
    fn test_new_record_slug_carries_sku() {
        let product = ExternalProduct {
            id: 3,
            title: "Mens Cotton Jacket".to_string(),
            price: Decimal::new(5599, 2),
            description: "great outerwear".to_string(),
            image: None,
        };
        let record = NewCatalogRecord::from_external(&product);
        assert_eq!(record.slug, "mens-cotton-jacket-3");
        assert_eq!(record.sku.as_str(), "3");
        assert_eq!(record.price().display(), "$55.99");
    }

    #[test]
    fn test_untitled_slug_falls_back_to_sku() {
        let product = ExternalProduct {
            id: 8,
            title: "★★★".to_string(),
            price: Decimal::ONE,
            description: String::new(),
            image: None,
        };
        assert_eq!(NewCatalogRecord::from_external(&product).slug, "product-8");
    }

    #[test]
    fn test_new_record_price_is_rounded_to_cents() {
        let product = ExternalProduct {
            id: 4,
            title: "Bulk Order".to_string(),
            price: "12345678901.235".parse().unwrap(),
            description: String::new(),
            image: None,
        };
        let record = NewCatalogRecord::from_external(&product);
        assert_eq!(record.price, Decimal::new(1_234_567_890_124, 2));
        assert_eq!(record.price().display(), "$12345678901.24");
    }
}
