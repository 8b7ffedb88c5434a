//! Privileged sync trigger.
//!
//! Any request whose query string carries the configured trigger parameter
//! (`?sync_products` by default) runs the sync job and is answered with a
//! plain-text message instead of reaching its route.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{AppError, add_breadcrumb};
use crate::services::sync::SyncRequester;
use crate::state::AppState;

use super::auth::OptionalAuth;

/// Middleware running the sync job when the trigger parameter is present.
pub async fn sync_trigger_middleware(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    request: Request,
    next: Next,
) -> Response {
    let sync = state.sync();
    if !has_trigger(request.uri().query(), sync.trigger_param()) {
        return next.run(request).await;
    }

    add_breadcrumb("sync", "Product sync requested", Some(&[("path", request.uri().path())]));

    // Authorize against the stored role, not the one cached in the session.
    let user = match user {
        Some(user) => match state.auth().refresh(&user).await {
            Ok(fresh) => fresh,
            Err(e) => return AppError::from(e).into_response(),
        },
        None => None,
    };

    let requester = user.map_or(SyncRequester::Anonymous, SyncRequester::User);
    match sync.run(&requester).await {
        Ok(report) => (StatusCode::OK, report.to_string()).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Whether `query` contains `param`, with or without a value.
fn has_trigger(query: Option<&str>, param: &str) -> bool {
    query.is_some_and(|q| {
        url::form_urlencoded::parse(q.as_bytes()).any(|(key, _)| key == param)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_detection() {
        assert!(has_trigger(Some("sync_products"), "sync_products"));
        assert!(has_trigger(Some("sync_products=1"), "sync_products"));
        assert!(has_trigger(Some("page=2&sync_products="), "sync_products"));
        assert!(!has_trigger(Some("sync_products_later=1"), "sync_products"));
        assert!(!has_trigger(Some("page=2"), "sync_products"));
        assert!(!has_trigger(None, "sync_products"));
    }
}
