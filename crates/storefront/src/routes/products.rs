//! Catalog grid and product detail handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::render::GridOptions;
use crate::render::image::record_image;
use crate::state::AppState;

/// Grid fragment query parameters.
#[derive(Debug, Deserialize)]
pub struct GridQuery {
    pub limit: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/product.html")]
pub struct ProductShowTemplate {
    pub title: String,
    pub description: String,
    pub price: String,
    pub sku: String,
    pub image_html: String,
    pub catalog_css: bool,
    pub user: Option<CurrentUser>,
}

/// The product grid as an HTML fragment.
#[instrument(skip(state))]
pub async fn grid(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> Result<Html<String>> {
    let options = GridOptions::from_limit(query.limit.as_deref());
    let html = state.grid().render(&options).await?;
    Ok(Html(html.to_string()))
}

/// Display a catalog record's page.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse> {
    let record = state
        .records()
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let image_html = record_image(&record)
        .to_html()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(ProductShowTemplate {
        price: record.price.display(),
        sku: record.sku.to_string(),
        title: record.title,
        description: record.description,
        image_html,
        catalog_css: true,
        user,
    })
}
