//! In-memory user store.
//!
//! Backs the test suites and local development without a database. The whole
//! map sits behind one `RwLock`; conditional updates run under the write
//! lock, which gives the same atomicity the Postgres store gets from
//! conditional `UPDATE` statements.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{PendingRegistration, Role, UserRecord, UserStore};
use crate::error::{StoreError, StoreResult};

/// Thread-safe in-memory implementation of [`UserStore`].
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, UserRecord>> {
        self.users.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, UserRecord>> {
        self.users.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn normalize(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self.read().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let email = Self::normalize(email);
        Ok(self
            .read()
            .values()
            .find(|u| u.email.as_deref() == Some(email.as_str()))
            .cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<UserRecord>> {
        if let Some(user) = self.find_by_email(identifier).await? {
            return Ok(Some(user));
        }
        let identifier = identifier.trim();
        Ok(self
            .read()
            .values()
            .find(|u| u.phone.as_deref() == Some(identifier))
            .cloned())
    }

    async fn email_taken_by_active(&self, email: &str) -> StoreResult<bool> {
        Ok(self
            .find_by_email(email)
            .await?
            .is_some_and(|u| u.active))
    }

    async fn upsert_pending_registration(
        &self,
        registration: PendingRegistration,
    ) -> StoreResult<UserRecord> {
        let email = Self::normalize(&registration.email);
        let now = OffsetDateTime::now_utc();
        let mut users = self.write();

        let existing = users
            .values()
            .find(|u| u.email.as_deref() == Some(email.as_str()))
            .map(|u| (u.id, u.active));

        let user = match existing {
            Some((_, true)) => return Err(StoreError::Conflict("users.email".into())),
            Some((id, false)) => {
                // Registration retry: overwrite the stalled pending state.
                let user = users.get_mut(&id).expect("record disappeared under write lock");
                user.phone = registration.phone;
                user.first_name = registration.first_name;
                user.last_name = registration.last_name;
                user.password_hash = registration.password_hash;
                user.verification_code_hash = registration.verification_code_hash;
                user.verification_code_expires_at = registration.verification_code_expires_at;
                user.updated_at = now;
                user.clone()
            }
            None => {
                let user = UserRecord {
                    id: Uuid::new_v4(),
                    email: Some(email),
                    phone: registration.phone,
                    first_name: registration.first_name,
                    last_name: registration.last_name,
                    password_hash: registration.password_hash,
                    hashed_refresh_token: String::new(),
                    verification_code_hash: registration.verification_code_hash,
                    verification_code_expires_at: registration.verification_code_expires_at,
                    active: false,
                    role: Role::User,
                    new_email: None,
                    created_at: now,
                    updated_at: now,
                };
                users.insert(user.id, user.clone());
                user
            }
        };

        Ok(user)
    }

    async fn set_verification_code(
        &self,
        id: Uuid,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut users = self.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.verification_code_hash = code_hash;
        user.verification_code_expires_at = expires_at;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn activate(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let mut users = self.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        user.active = true;
        user.verification_code_hash = String::new();
        user.verification_code_expires_at = OffsetDateTime::UNIX_EPOCH;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn store_refresh_token_hash(&self, id: Uuid, token_hash: String) -> StoreResult<bool> {
        let mut users = self.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.hashed_refresh_token = token_hash;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn swap_refresh_token_hash(
        &self,
        id: Uuid,
        current_hash: &str,
        token_hash: String,
    ) -> StoreResult<bool> {
        let mut users = self.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        // Compare-and-swap under the write lock: a concurrent rotation that
        // already replaced the hash makes this a no-op failure.
        if user.hashed_refresh_token != current_hash {
            return Ok(false);
        }
        user.hashed_refresh_token = token_hash;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: String,
        revoke_session: bool,
    ) -> StoreResult<bool> {
        let mut users = self.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.password_hash = password_hash;
        if revoke_session {
            user.hashed_refresh_token = String::new();
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn stage_email_change(
        &self,
        id: Uuid,
        new_email: String,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> StoreResult<bool> {
        let new_email = Self::normalize(&new_email);
        let mut users = self.write();
        if users
            .values()
            .any(|u| u.id != id && u.active && u.email.as_deref() == Some(new_email.as_str()))
        {
            return Err(StoreError::Conflict("users.email".into()));
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.new_email = Some(new_email);
        user.verification_code_hash = code_hash;
        user.verification_code_expires_at = expires_at;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn commit_email_change(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let mut users = self.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        let Some(new_email) = user.new_email.take() else {
            return Ok(None);
        };
        user.email = Some(new_email);
        user.verification_code_hash = String::new();
        user.verification_code_expires_at = OffsetDateTime::UNIX_EPOCH;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}
