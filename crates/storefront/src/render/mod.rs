//! HTML rendering for the product grid directive.
//!
//! - [`image`] - product `<img>` markup
//! - [`grid`] - the cached grid itself
//! - [`shortcode`] - `[api_products]` expansion inside page content

pub mod grid;
pub mod image;
pub mod shortcode;

pub use grid::{GridOptions, GridRenderer};
pub use shortcode::RenderContext;

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}
