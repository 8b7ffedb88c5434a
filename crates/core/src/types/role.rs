//! User roles and the capabilities they grant.

use serde::{Deserialize, Serialize};

/// Role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "catalog.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access, including user management.
    Administrator,
    /// Manages the product catalog.
    ShopManager,
    /// Regular shopper account.
    Customer,
}

impl UserRole {
    /// Whether this role may create, update and sync catalog records.
    #[must_use]
    pub const fn can_manage_catalog(&self) -> bool {
        matches!(self, Self::Administrator | Self::ShopManager)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Administrator => write!(f, "administrator"),
            Self::ShopManager => write!(f, "shop_manager"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(Self::Administrator),
            "shop_manager" => Ok(Self::ShopManager),
            "customer" => Ok(Self::Customer),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_capability() {
        assert!(UserRole::Administrator.can_manage_catalog());
        assert!(UserRole::ShopManager.can_manage_catalog());
        assert!(!UserRole::Customer.can_manage_catalog());
    }

    #[test]
    fn test_role_string_forms_agree() {
        for role in [
            UserRole::Administrator,
            UserRole::ShopManager,
            UserRole::Customer,
        ] {
            assert_eq!(role.to_string().parse::<UserRole>(), Ok(role));
        }
        assert!("owner".parse::<UserRole>().is_err());
    }
}
