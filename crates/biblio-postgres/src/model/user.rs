//! User account model for PostgreSQL database operations.
//!
//! ## Models
//!
//! - [`User`] - Account row with credential hashes and verification state
//! - [`NewUser`] - Data structure for inserting a pending registration
//! - [`UpdateUser`] - Data structure for partial account updates

use biblio_core::UserRecord;
use diesel::prelude::*;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::schema::users;
use crate::types::UserRole;

/// User account row.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    /// Unique account identifier.
    pub id: Uuid,
    /// Primary email address; unique when present.
    pub email: Option<String>,
    /// Phone number; alternate unique identifier when present.
    pub phone: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Argon2 hash of the current password.
    pub password_hash: String,
    /// Argon2 hash of the active refresh token; empty means no session.
    pub hashed_refresh_token: String,
    /// Argon2 hash of the pending one-time code; empty when none pending.
    pub verification_code_hash: String,
    /// Deadline after which the pending code is invalid.
    pub verification_code_expires_at: OffsetDateTime,
    /// Whether the account completed code verification.
    pub active: bool,
    /// Access level.
    pub role: UserRole,
    /// Staged email address awaiting verification.
    pub new_email: Option<String>,
    /// Timestamp when the row was created.
    pub created_at: OffsetDateTime,
    /// Timestamp when the row was last updated.
    pub updated_at: OffsetDateTime,
}

/// Data for inserting a pending registration.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser {
    /// Primary email address.
    pub email: Option<String>,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Argon2 hash of the chosen password.
    pub password_hash: String,
    /// Argon2 hash of the issued one-time code.
    pub verification_code_hash: String,
    /// Deadline for the issued code.
    pub verification_code_expires_at: OffsetDateTime,
}

/// Data for updating an account.
///
/// Outer `None` skips a column; for nullable columns the inner option
/// distinguishes "set to value" from "set to NULL".
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateUser {
    /// Primary email address.
    pub email: Option<Option<String>>,
    /// Argon2 hash of the password.
    pub password_hash: Option<String>,
    /// Argon2 hash of the active refresh token.
    pub hashed_refresh_token: Option<String>,
    /// Argon2 hash of the pending one-time code.
    pub verification_code_hash: Option<String>,
    /// Deadline for the pending code.
    pub verification_code_expires_at: Option<OffsetDateTime>,
    /// Verification status.
    pub active: Option<bool>,
    /// Staged email address.
    pub new_email: Option<Option<String>>,
}

impl User {
    /// Returns whether a verification code is currently pending.
    pub fn has_pending_code(&self) -> bool {
        !self.verification_code_hash.is_empty()
    }

    /// Returns whether the account holds an established session.
    pub fn has_session(&self) -> bool {
        !self.hashed_refresh_token.is_empty()
    }

    /// Returns whether the account can authenticate.
    pub fn can_login(&self) -> bool {
        self.active
    }

    /// Returns whether an email change is staged on this account.
    pub fn has_pending_email_change(&self) -> bool {
        self.new_email.is_some()
    }
}

impl From<User> for UserRecord {
    fn from(user: User) -> Self {
        UserRecord {
            id: user.id,
            email: user.email,
            phone: user.phone,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            hashed_refresh_token: user.hashed_refresh_token,
            verification_code_hash: user.verification_code_hash,
            verification_code_expires_at: user.verification_code_expires_at,
            active: user.active,
            role: user.role.into(),
            new_email: user.new_email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
