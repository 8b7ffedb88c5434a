//! Authentication service.
//!
//! Email and password sign-in for catalog managers. Passwords are stored as
//! Argon2id PHC strings.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use catalog_bridge_core::UserRole;

use crate::db::{RepositoryError, UserStore};
use crate::models::{CurrentUser, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Create an account with the given role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password), fields(role = %role))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(&email, &password_hash, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        Ok(CurrentUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }

    /// Reload a signed-in user from the store.
    ///
    /// The session only holds the role granted at login; privileged actions
    /// call this so a changed role takes effect immediately. Returns `None`
    /// if the account no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn refresh(&self, user: &CurrentUser) -> Result<Option<CurrentUser>, AuthError> {
        let fresh = self.users.find_by_id(user.id).await?;
        Ok(fresh.map(|u| CurrentUser {
            id: u.id,
            email: u.email,
            role: u.role,
        }))
    }

    /// Give an existing account a new role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownUser` if no account has this email.
    #[instrument(skip(self), fields(role = %role))]
    pub async fn change_role(&self, email: &str, role: UserRole) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::UnknownUser(email.clone()))?;

        self.users.set_role(user.id, role).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UnknownUser(email),
            other => AuthError::Repository(other),
        })?;

        user.role = role;
        Ok(user)
    }
}

/// Trim and lowercase an email address.
fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AuthError::InvalidEmail(email)),
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryUserStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryUserStore::new()))
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        auth.register(" Manager@Shop.test ", "correct horse", UserRole::ShopManager)
            .await
            .unwrap();

        let user = auth.login("manager@shop.test", "correct horse").await.unwrap();
        assert_eq!(user.email, "manager@shop.test");
        assert!(user.can_manage_catalog());
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let auth = service();
        auth.register("a@b.test", "correct horse", UserRole::Customer)
            .await
            .unwrap();

        assert!(matches!(
            auth.login("a@b.test", "battery staple").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@b.test", "correct horse").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let auth = service();
        auth.register("a@b.test", "correct horse", UserRole::Customer)
            .await
            .unwrap();
        assert!(matches!(
            auth.register("A@B.test", "correct horse", UserRole::Customer)
                .await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_role_change() {
        let auth = service();
        auth.register("manager@shop.test", "correct horse", UserRole::ShopManager)
            .await
            .unwrap();
        let session_user = auth.login("manager@shop.test", "correct horse").await.unwrap();

        let demoted = auth
            .change_role("Manager@Shop.test", UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(demoted.role, UserRole::Customer);

        // The session copy still carries the login-time role.
        assert!(session_user.can_manage_catalog());
        let fresh = auth.refresh(&session_user).await.unwrap().unwrap();
        assert_eq!(fresh.role, UserRole::Customer);
        assert!(!fresh.can_manage_catalog());
    }

    #[tokio::test]
    async fn test_refresh_of_missing_account_is_none() {
        let auth = service();
        let ghost = CurrentUser {
            id: catalog_bridge_core::UserId::new(99),
            email: "ghost@shop.test".to_string(),
            role: UserRole::Administrator,
        };
        assert!(auth.refresh(&ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_role_of_unknown_email() {
        let auth = service();
        assert!(matches!(
            auth.change_role("nobody@shop.test", UserRole::Customer).await,
            Err(AuthError::UnknownUser(email)) if email == "nobody@shop.test"
        ));
    }

    #[test]
    fn test_password_and_email_validation() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@domain").is_err());
    }
}
