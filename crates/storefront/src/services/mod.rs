//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Email/password sign-in for catalog managers
//! - `sku` - Batch SKU to record resolution
//! - `images` - Remote image import into the media library
//! - `sync` - Remote catalog sync job

pub mod auth;
pub mod images;
pub mod sku;
pub mod sync;
