//! Database-mapped enumerations.

use biblio_core::Role;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Access level of an account.
///
/// This enumeration corresponds to the `user_role` PostgreSQL enum and maps
/// one-to-one onto the domain-level [`Role`].
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::UserRole"]
pub enum UserRole {
    /// Regular library member.
    #[db_rename = "user"]
    #[serde(rename = "user")]
    #[default]
    User,

    /// Platform administrator.
    #[db_rename = "admin"]
    #[serde(rename = "admin")]
    Admin,

    /// Child account with a restricted catalog.
    #[db_rename = "kid"]
    #[serde(rename = "kid")]
    Kid,
}

impl From<UserRole> for Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => Role::User,
            UserRole::Admin => Role::Admin,
            UserRole::Kid => Role::Kid,
        }
    }
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => UserRole::User,
            Role::Admin => UserRole::Admin,
            Role::Kid => UserRole::Kid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn role_mapping_round_trips() {
        for role in UserRole::iter() {
            assert_eq!(UserRole::from(Role::from(role)), role);
        }
    }
}
