//! Postgres-backed implementation of the user-store contract.

use async_trait::async_trait;
use biblio_core::{PendingRegistration, StoreResult, UserRecord, UserStore};
use time::OffsetDateTime;
use uuid::Uuid;

use biblio_core::StoreError as CoreStoreError;

use crate::model::NewUser;
use crate::query::UserRepository;
use crate::{PgClient, PooledConnection};

/// [`UserStore`] adapter over a pooled [`PgClient`].
///
/// Each operation checks out one connection, runs one repository call, and
/// maps row models into domain records. Uniqueness violations surface as
/// [`StoreError::Conflict`]; everything else becomes a backend error.
///
/// [`StoreError::Conflict`]: biblio_core::StoreError::Conflict
#[derive(Debug, Clone)]
pub struct PgUserStore {
    client: PgClient,
}

impl PgUserStore {
    /// Creates a new store over the given client.
    #[must_use]
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    async fn conn(&self) -> StoreResult<PooledConnection> {
        self.client
            .get_connection()
            .await
            .map_err(CoreStoreError::from)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let user = conn.find_user_by_id(id).await.map_err(CoreStoreError::from)?;
        Ok(user.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let user = conn
            .find_user_by_email(email)
            .await
            .map_err(CoreStoreError::from)?;
        Ok(user.map(UserRecord::from))
    }

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let user = conn
            .find_user_by_identifier(identifier)
            .await
            .map_err(CoreStoreError::from)?;
        Ok(user.map(UserRecord::from))
    }

    async fn email_taken_by_active(&self, email: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.active_email_exists(email)
            .await
            .map_err(CoreStoreError::from)
    }

    async fn upsert_pending_registration(
        &self,
        registration: PendingRegistration,
    ) -> StoreResult<UserRecord> {
        let mut conn = self.conn().await?;

        // An active owner of this email must fail as a conflict, not be
        // silently skipped by the inactive-only update below.
        if conn
            .active_email_exists(&registration.email)
            .await
            .map_err(CoreStoreError::from)?
        {
            return Err(CoreStoreError::Conflict("users.email".into()));
        }

        let new_user = NewUser {
            email: Some(registration.email),
            phone: registration.phone,
            first_name: registration.first_name,
            last_name: registration.last_name,
            password_hash: registration.password_hash,
            verification_code_hash: registration.verification_code_hash,
            verification_code_expires_at: registration.verification_code_expires_at,
        };

        let user = conn
            .upsert_pending_registration(new_user)
            .await
            .map_err(CoreStoreError::from)?;
        Ok(UserRecord::from(user))
    }

    async fn set_verification_code(
        &self,
        id: Uuid,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.set_verification_code(id, code_hash, expires_at)
            .await
            .map_err(CoreStoreError::from)
    }

    async fn activate(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let user = conn.activate_user(id).await.map_err(CoreStoreError::from)?;
        Ok(user.map(UserRecord::from))
    }

    async fn store_refresh_token_hash(&self, id: Uuid, token_hash: String) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.store_refresh_token_hash(id, token_hash)
            .await
            .map_err(CoreStoreError::from)
    }

    async fn swap_refresh_token_hash(
        &self,
        id: Uuid,
        current_hash: &str,
        token_hash: String,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.swap_refresh_token_hash(id, current_hash, token_hash)
            .await
            .map_err(CoreStoreError::from)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: String,
        revoke_session: bool,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.update_password(id, password_hash, revoke_session)
            .await
            .map_err(CoreStoreError::from)
    }

    async fn stage_email_change(
        &self,
        id: Uuid,
        new_email: String,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;

        if conn
            .active_email_exists(&new_email)
            .await
            .map_err(CoreStoreError::from)?
        {
            return Err(CoreStoreError::Conflict("users.email".into()));
        }

        conn.stage_email_change(id, new_email, code_hash, expires_at)
            .await
            .map_err(CoreStoreError::from)
    }

    async fn commit_email_change(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let mut conn = self.conn().await?;
        let user = conn
            .commit_email_change(id)
            .await
            .map_err(CoreStoreError::from)?;
        Ok(user.map(UserRecord::from))
    }
}
