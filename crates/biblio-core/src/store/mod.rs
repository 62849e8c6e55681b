//! User records and the persistence contract consumed by the auth service.
//!
//! The [`UserStore`] trait is the narrow seam between the authentication core
//! and whatever holds user records. The service only ever needs point lookups
//! and single-record conditional updates; anything richer belongs to the
//! implementation. Two implementations exist: [`MemoryUserStore`] in this
//! crate (tests, local development) and the Postgres-backed store in
//! `biblio-postgres`.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

pub use self::memory::MemoryUserStore;
use crate::error::StoreResult;

/// Access level of an account.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Regular library member.
    #[default]
    User,
    /// Platform administrator.
    Admin,
    /// Child account with a restricted catalog.
    Kid,
}

impl Role {
    /// Returns whether this role has administrative privileges.
    #[inline]
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// A user record as held by the store.
///
/// This is the internal shape: it carries the credential hashes and the
/// verification state. It must never cross the service boundary; responses
/// use [`PublicUser`], which structurally cannot hold any secret field.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
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
    /// Argon2 hash of the most recently issued refresh token.
    ///
    /// The empty string means "no valid session". This field is the sole
    /// source of truth for whether a refresh token is honored.
    pub hashed_refresh_token: String,
    /// Argon2 hash of the pending one-time code; empty when none is pending.
    pub verification_code_hash: String,
    /// Deadline after which the pending code is invalid.
    pub verification_code_expires_at: OffsetDateTime,
    /// Whether the account completed code verification.
    pub active: bool,
    /// Access level.
    pub role: Role,
    /// Staged email address awaiting verification, if any.
    pub new_email: Option<String>,
    /// Timestamp when the record was created.
    pub created_at: OffsetDateTime,
    /// Timestamp when the record was last updated.
    pub updated_at: OffsetDateTime,
}

impl UserRecord {
    /// Returns whether a verification code is currently pending.
    #[must_use]
    pub fn has_pending_code(&self) -> bool {
        !self.verification_code_hash.is_empty()
    }

    /// Returns whether the pending code has expired at `now`.
    #[must_use]
    pub fn code_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.verification_code_expires_at
    }

    /// Returns whether the account holds an established session.
    #[must_use]
    pub fn has_session(&self) -> bool {
        !self.hashed_refresh_token.is_empty()
    }

    /// Returns a copy of this record with every secret field blanked.
    ///
    /// Used where a record flows onward after an internal check and must not
    /// leak hashes into later code paths.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.password_hash = String::new();
        self.hashed_refresh_token = String::new();
        self.verification_code_hash = String::new();
        self.verification_code_expires_at = OffsetDateTime::UNIX_EPOCH;
        self
    }
}

/// The user shape returned to callers.
///
/// Contains no hash or verification fields by construction, so the "never
/// leak credential state" invariant cannot be violated by forgetting to strip
/// a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Unique account identifier.
    pub id: Uuid,
    /// Primary email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Access level.
    pub role: Role,
    /// Whether the account completed code verification.
    pub active: bool,
    /// Timestamp when the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for PublicUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            phone: user.phone,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

/// Data for creating or overwriting a pending (inactive) registration.
///
/// Registration retries for a stalled signup reuse this shape: the password
/// hash, profile fields, and verification state of the inactive record are
/// overwritten wholesale.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    /// Primary email address.
    pub email: String,
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

/// Persistence contract for user records.
///
/// Every operation targets a single record. Mutations return `bool` for
/// "did a record change", which the service maps to its own failure kinds.
/// `swap_refresh_token_hash` must be atomic: compare the stored hash and
/// overwrite it in one step, so two concurrent rotations cannot both succeed.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Finds a user by unique identifier.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    /// Finds a user by email address (case-insensitive).
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// Finds a user by email, falling back to phone number.
    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<UserRecord>>;

    /// Returns whether an *active* user owns this email address.
    async fn email_taken_by_active(&self, email: &str) -> StoreResult<bool>;

    /// Inserts a new inactive user, or overwrites the pending state of an
    /// existing inactive user with the same email.
    ///
    /// Returns a [`StoreError::Conflict`] if the email belongs to an active
    /// account (races with a concurrent activation are resolved here).
    ///
    /// [`StoreError::Conflict`]: crate::error::StoreError::Conflict
    async fn upsert_pending_registration(
        &self,
        registration: PendingRegistration,
    ) -> StoreResult<UserRecord>;

    /// Replaces the pending verification code on an existing user.
    ///
    /// Overwrites any previous code hash, upholding the single-pending-code
    /// invariant.
    async fn set_verification_code(
        &self,
        id: Uuid,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> StoreResult<bool>;

    /// Marks a user active and clears the consumed verification code.
    async fn activate(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    /// Stores a new refresh-token hash, replacing whatever was there.
    ///
    /// Used at login: a fresh session unconditionally supersedes any prior
    /// one (single-session-per-account model).
    async fn store_refresh_token_hash(&self, id: Uuid, token_hash: String) -> StoreResult<bool>;

    /// Atomically replaces the refresh-token hash if it still equals
    /// `current_hash`.
    ///
    /// Returns `false` when the stored hash changed in the meantime; the
    /// losing side of a concurrent rotation observes this as a clean
    /// failure. Pass an empty `token_hash` to revoke the session (logout).
    async fn swap_refresh_token_hash(
        &self,
        id: Uuid,
        current_hash: &str,
        token_hash: String,
    ) -> StoreResult<bool>;

    /// Stores a new password hash, optionally revoking the active session.
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: String,
        revoke_session: bool,
    ) -> StoreResult<bool>;

    /// Stages a pending email change together with its verification code.
    ///
    /// The staged address lives on the *current* record; the code is bound
    /// to the account, not to the new address.
    async fn stage_email_change(
        &self,
        id: Uuid,
        new_email: String,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> StoreResult<bool>;

    /// Promotes the staged email to the primary address and clears staging.
    ///
    /// Returns `None` when the user is missing or has no staged address.
    async fn commit_email_change(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;
}
