//! User repository for account persistence.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{NewUser, UpdateUser, User};
use crate::{PgConnection, PgError, PgResult, schema};

/// Repository for user account database operations.
///
/// Handles the account lifecycle: registration upserts, verification state,
/// session-hash bookkeeping, and the staged email change. Mutations return
/// the number of affected rows as `bool` where the caller only needs to know
/// whether anything changed.
pub trait UserRepository {
    /// Finds a user by unique identifier.
    fn find_user_by_id(
        &mut self,
        user_id: Uuid,
    ) -> impl Future<Output = PgResult<Option<User>>> + Send;

    /// Finds a user by email address.
    ///
    /// Emails are stored normalized to lowercase; the lookup normalizes the
    /// argument the same way.
    fn find_user_by_email(
        &mut self,
        email: &str,
    ) -> impl Future<Output = PgResult<Option<User>>> + Send;

    /// Finds a user by email, falling back to phone number.
    fn find_user_by_identifier(
        &mut self,
        identifier: &str,
    ) -> impl Future<Output = PgResult<Option<User>>> + Send;

    /// Checks whether an active account owns this email address.
    fn active_email_exists(
        &mut self,
        email: &str,
    ) -> impl Future<Output = PgResult<bool>> + Send;

    /// Inserts a pending registration, or overwrites the pending state of an
    /// inactive account with the same email.
    ///
    /// Fails with a unique violation when the email belongs to an active
    /// account.
    fn upsert_pending_registration(
        &mut self,
        new_user: NewUser,
    ) -> impl Future<Output = PgResult<User>> + Send;

    /// Replaces the pending verification code.
    fn set_verification_code(
        &mut self,
        user_id: Uuid,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> impl Future<Output = PgResult<bool>> + Send;

    /// Marks the account active and clears the consumed code.
    fn activate_user(
        &mut self,
        user_id: Uuid,
    ) -> impl Future<Output = PgResult<Option<User>>> + Send;

    /// Stores a refresh-token hash, replacing any previous session.
    fn store_refresh_token_hash(
        &mut self,
        user_id: Uuid,
        token_hash: String,
    ) -> impl Future<Output = PgResult<bool>> + Send;

    /// Atomically swaps the refresh-token hash if it still matches.
    ///
    /// The conditional `UPDATE` is what makes concurrent rotations safe: the
    /// filter on the current hash turns the read-compare-write sequence into
    /// one statement, so the losing writer updates zero rows.
    fn swap_refresh_token_hash(
        &mut self,
        user_id: Uuid,
        current_hash: &str,
        token_hash: String,
    ) -> impl Future<Output = PgResult<bool>> + Send;

    /// Stores a new password hash, optionally clearing the session hash.
    fn update_password(
        &mut self,
        user_id: Uuid,
        password_hash: String,
        revoke_session: bool,
    ) -> impl Future<Output = PgResult<bool>> + Send;

    /// Stages a pending email change with its verification code.
    fn stage_email_change(
        &mut self,
        user_id: Uuid,
        new_email: String,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> impl Future<Output = PgResult<bool>> + Send;

    /// Promotes the staged email to the primary address.
    fn commit_email_change(
        &mut self,
        user_id: Uuid,
    ) -> impl Future<Output = PgResult<Option<User>>> + Send;
}

impl UserRepository for PgConnection {
    async fn find_user_by_id(&mut self, user_id: Uuid) -> PgResult<Option<User>> {
        use schema::users::{self, dsl};

        users::table
            .filter(dsl::id.eq(user_id))
            .select(User::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)
    }

    async fn find_user_by_email(&mut self, email: &str) -> PgResult<Option<User>> {
        use schema::users::{self, dsl};

        users::table
            .filter(dsl::email.eq(email.trim().to_lowercase()))
            .select(User::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)
    }

    async fn find_user_by_identifier(&mut self, identifier: &str) -> PgResult<Option<User>> {
        if let Some(user) = self.find_user_by_email(identifier).await? {
            return Ok(Some(user));
        }

        use schema::users::{self, dsl};

        users::table
            .filter(dsl::phone.eq(identifier.trim()))
            .select(User::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)
    }

    async fn active_email_exists(&mut self, email: &str) -> PgResult<bool> {
        use schema::users::{self, dsl};

        let count: i64 = users::table
            .filter(dsl::email.eq(email.trim().to_lowercase()))
            .filter(dsl::active.eq(true))
            .count()
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(count > 0)
    }

    async fn upsert_pending_registration(&mut self, mut new_user: NewUser) -> PgResult<User> {
        use schema::users::{self, dsl};

        new_user.email = new_user.email.map(|e| e.trim().to_lowercase());

        // Overwrite-or-insert in two conditional steps rather than one
        // ON CONFLICT clause: the update must only touch inactive rows, and
        // the unique index on email turns a lost insert race into a clean
        // unique-violation error.
        let overwritten = diesel::update(
            users::table
                .filter(dsl::email.eq(new_user.email.clone()))
                .filter(dsl::active.eq(false)),
        )
        .set((
            dsl::phone.eq(new_user.phone.clone()),
            dsl::first_name.eq(&new_user.first_name),
            dsl::last_name.eq(&new_user.last_name),
            dsl::password_hash.eq(&new_user.password_hash),
            dsl::verification_code_hash.eq(&new_user.verification_code_hash),
            dsl::verification_code_expires_at.eq(new_user.verification_code_expires_at),
        ))
        .returning(User::as_returning())
        .get_result(self)
        .await
        .optional()
        .map_err(PgError::from)?;

        if let Some(user) = overwritten {
            return Ok(user);
        }

        diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)
    }

    async fn set_verification_code(
        &mut self,
        user_id: Uuid,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> PgResult<bool> {
        use schema::users::{self, dsl};

        let updated = diesel::update(users::table.filter(dsl::id.eq(user_id)))
            .set(UpdateUser {
                verification_code_hash: Some(code_hash),
                verification_code_expires_at: Some(expires_at),
                ..Default::default()
            })
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(updated > 0)
    }

    async fn activate_user(&mut self, user_id: Uuid) -> PgResult<Option<User>> {
        use schema::users::{self, dsl};

        diesel::update(users::table.filter(dsl::id.eq(user_id)))
            .set(UpdateUser {
                active: Some(true),
                verification_code_hash: Some(String::new()),
                verification_code_expires_at: Some(OffsetDateTime::UNIX_EPOCH),
                ..Default::default()
            })
            .returning(User::as_returning())
            .get_result(self)
            .await
            .optional()
            .map_err(PgError::from)
    }

    async fn store_refresh_token_hash(
        &mut self,
        user_id: Uuid,
        token_hash: String,
    ) -> PgResult<bool> {
        use schema::users::{self, dsl};

        let updated = diesel::update(users::table.filter(dsl::id.eq(user_id)))
            .set(dsl::hashed_refresh_token.eq(token_hash))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(updated > 0)
    }

    async fn swap_refresh_token_hash(
        &mut self,
        user_id: Uuid,
        current_hash: &str,
        token_hash: String,
    ) -> PgResult<bool> {
        use schema::users::{self, dsl};

        let updated = diesel::update(
            users::table
                .filter(dsl::id.eq(user_id))
                .filter(dsl::hashed_refresh_token.eq(current_hash)),
        )
        .set(dsl::hashed_refresh_token.eq(token_hash))
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(updated > 0)
    }

    async fn update_password(
        &mut self,
        user_id: Uuid,
        password_hash: String,
        revoke_session: bool,
    ) -> PgResult<bool> {
        use schema::users::{self, dsl};

        let changes = UpdateUser {
            password_hash: Some(password_hash),
            hashed_refresh_token: revoke_session.then(String::new),
            ..Default::default()
        };

        let updated = diesel::update(users::table.filter(dsl::id.eq(user_id)))
            .set(changes)
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(updated > 0)
    }

    async fn stage_email_change(
        &mut self,
        user_id: Uuid,
        new_email: String,
        code_hash: String,
        expires_at: OffsetDateTime,
    ) -> PgResult<bool> {
        use schema::users::{self, dsl};

        let updated = diesel::update(users::table.filter(dsl::id.eq(user_id)))
            .set(UpdateUser {
                new_email: Some(Some(new_email.trim().to_lowercase())),
                verification_code_hash: Some(code_hash),
                verification_code_expires_at: Some(expires_at),
                ..Default::default()
            })
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(updated > 0)
    }

    async fn commit_email_change(&mut self, user_id: Uuid) -> PgResult<Option<User>> {
        use schema::users::{self, dsl};

        // The staged address becomes primary in one statement; the filter on
        // a present new_email makes a double-commit a no-op.
        diesel::update(
            users::table
                .filter(dsl::id.eq(user_id))
                .filter(dsl::new_email.is_not_null()),
        )
        .set((
            dsl::email.eq(dsl::new_email),
            dsl::new_email.eq(None::<String>),
            dsl::verification_code_hash.eq(String::new()),
            dsl::verification_code_expires_at.eq(OffsetDateTime::UNIX_EPOCH),
        ))
        .returning(User::as_returning())
        .get_result(self)
        .await
        .optional()
        .map_err(PgError::from)
    }
}
