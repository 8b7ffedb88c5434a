//! Core types for catalog-bridge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod product;
pub mod role;
pub mod sku;

pub use id::*;
pub use price::{CurrencyCode, Price};
pub use product::{ExternalProduct, ProductError, RawProduct, parse_image_url};
pub use role::UserRole;
pub use sku::{Sku, SkuError};
