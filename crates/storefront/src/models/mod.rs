//! Domain models for the storefront.

pub mod catalog;
pub mod session;
pub mod user;

pub use catalog::{CatalogRecord, MediaItem, NewCatalogRecord, NewMediaItem, Thumbnail};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
