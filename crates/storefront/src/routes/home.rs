//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::render::{RenderContext, shortcode};
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub body: String,
    pub catalog_css: bool,
    pub user: Option<CurrentUser>,
}

/// Display the home page: the configured content with directives expanded.
#[instrument(skip(state, user))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse> {
    let mut ctx = RenderContext::new();
    let body = shortcode::expand(&state.config().home_content, state.grid(), &mut ctx).await?;

    Ok(HomeTemplate {
        body,
        catalog_css: ctx.has_grid,
        user,
    })
}
