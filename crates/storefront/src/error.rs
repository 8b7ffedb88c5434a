//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::render::RenderError;
use crate::services::auth::AuthError;
use crate::services::sync::SyncError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A sync request ended early; carries its own status.
    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status sent to the client.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_)
            | Self::Render(_)
            | Self::Internal(_)
            | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::UserAlreadyExists) => StatusCode::CONFLICT,
            Self::Auth(AuthError::UnknownUser(_)) => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::WeakPassword(_) | AuthError::InvalidEmail(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Sync(err) => err.status_code(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Body text sent to the client. Server-side details stay in the logs.
    fn public_message(&self) -> Cow<'_, str> {
        match self {
            Self::Database(_) | Self::Render(_) | Self::Internal(_) => {
                Cow::Borrowed("Internal server error")
            }
            Self::Sync(SyncError::Storage(_)) => Cow::Borrowed("Product sync failed"),
            Self::Auth(AuthError::InvalidCredentials) => Cow::Borrowed("Invalid credentials"),
            Self::Auth(AuthError::UserAlreadyExists) => {
                Cow::Borrowed("An account with this email already exists")
            }
            Self::Auth(AuthError::WeakPassword(msg)) => Cow::Borrowed(msg.as_str()),
            Self::Auth(AuthError::InvalidEmail(_)) => Cow::Borrowed("Invalid email address"),
            Self::Auth(AuthError::UnknownUser(_)) => Cow::Borrowed("No such account"),
            Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash) => {
                Cow::Borrowed("Authentication error")
            }
            Self::Sync(_) | Self::NotFound(_) => Cow::Owned(self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() && !matches!(self, Self::Sync(SyncError::FetchFailed)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, self.public_message().into_owned()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_of(err: AppError) -> String {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("mens-cotton-jacket-3".to_string());
        assert_eq!(err.to_string(), "Not found: mens-cotton-jacket-3");

        let err = AppError::Sync(SyncError::AlreadyRunning);
        assert_eq!(err.to_string(), "A product sync is already running.");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::WeakPassword("short".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sync_errors_keep_their_status() {
        assert_eq!(
            get_status(AppError::Sync(SyncError::CommerceDisabled)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Sync(SyncError::Forbidden)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Sync(SyncError::FetchFailed)),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_of(AppError::Internal("template exploded at line 3".to_string())).await;
        assert_eq!(body, "Internal server error");

        let body = body_of(AppError::Sync(SyncError::Unauthenticated)).await;
        assert_eq!(body, "You must be signed in to sync products.");
    }
}
