//! User management commands.

use std::sync::Arc;

use catalog_bridge_core::UserRole;
use catalog_bridge_storefront::db::PgUserStore;
use catalog_bridge_storefront::services::auth::{AuthError, AuthService};

use super::{ConnectError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: administrator, shop_manager, customer")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

fn parse_role(role: &str) -> Result<UserRole, UserError> {
    role.parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))
}

async fn auth_service() -> Result<AuthService, UserError> {
    let pool = connect().await?;
    Ok(AuthService::new(Arc::new(PgUserStore::new(pool))))
}

/// Create a user with a password.
pub async fn create(email: &str, password: &str, role: &str) -> Result<(), UserError> {
    let role = parse_role(role)?;
    let auth = auth_service().await?;

    let user = auth.register(email, password, role).await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    if !role.can_manage_catalog() {
        tracing::warn!("Note: role {role} cannot trigger a catalog sync.");
    }
    Ok(())
}

/// Change the role of an existing user. Takes effect on their next sync request.
pub async fn set_role(email: &str, role: &str) -> Result<(), UserError> {
    let role = parse_role(role)?;
    let auth = auth_service().await?;

    let user = auth.change_role(email, role).await?;

    tracing::info!("User {} now has role {}", user.email, user.role);
    Ok(())
}
