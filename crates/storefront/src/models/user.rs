//! User account model.

use chrono::{DateTime, Utc};

use catalog_bridge_core::{UserId, UserRole};

/// A stored user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    /// Lowercased email address, unique.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}
