//! Product image markup.
//!
//! Image source, in order of preference:
//!
//! 1. the record's imported thumbnail, with responsive hints
//! 2. the remote product image URL
//! 3. the placeholder bundled under `/static`

use askama::Template;
use url::Url;

use catalog_bridge_core::ExternalProduct;

use crate::models::CatalogRecord;

/// Placeholder shown when a product has no usable image.
pub const PLACEHOLDER_SRC: &str = "/static/images/placeholder.svg";

/// Rendered size of grid images, in CSS pixels.
const IMAGE_SIZE: u32 = 300;

const THUMBNAIL_SIZES: &str = "(max-width: 600px) 50vw, 300px";

/// A product `<img>` element.
#[derive(Debug, Clone, PartialEq, Eq, Template)]
#[template(path = "partials/product_image.html")]
pub struct ProductImage {
    pub src: String,
    pub alt: String,
    pub width: u32,
    pub height: u32,
    pub srcset: Option<String>,
    pub sizes: Option<String>,
    pub loading: &'static str,
    pub fetchpriority: &'static str,
}

impl ProductImage {
    /// Render the element. Attribute values are HTML-escaped.
    ///
    /// # Errors
    ///
    /// Returns `askama::Error` if rendering fails.
    pub fn to_html(&self) -> askama::Result<String> {
        self.render()
    }
}

/// Choose the image for a product card.
///
/// The high-priority image loads eagerly; every other image is lazy and
/// low priority.
#[must_use]
pub fn product_image(
    record: &CatalogRecord,
    product: &ExternalProduct,
    high_priority: bool,
) -> ProductImage {
    select(record, product.image.as_ref(), high_priority)
}

/// The image for a record's own page: thumbnail or placeholder, loaded
/// eagerly.
#[must_use]
pub fn record_image(record: &CatalogRecord) -> ProductImage {
    select(record, None, true)
}

fn select(record: &CatalogRecord, remote: Option<&Url>, high_priority: bool) -> ProductImage {
    let (loading, fetchpriority) = if high_priority {
        ("eager", "high")
    } else {
        ("lazy", "low")
    };

    let (src, srcset, sizes) = if let Some(thumbnail) = &record.thumbnail {
        (
            thumbnail.url.clone(),
            Some(format!("{} {IMAGE_SIZE}w", thumbnail.url)),
            Some(THUMBNAIL_SIZES.to_string()),
        )
    } else if let Some(url) = remote {
        (url.to_string(), None, None)
    } else {
        (PLACEHOLDER_SRC.to_string(), None, None)
    };

    ProductImage {
        src,
        alt: record.title.clone(),
        width: IMAGE_SIZE,
        height: IMAGE_SIZE,
        srcset,
        sizes,
        loading,
        fetchpriority,
    }
}
