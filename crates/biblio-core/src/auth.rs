//! Account lifecycle orchestration.
//!
//! [`AuthService`] drives registration with email-code verification, login,
//! refresh-token rotation, logout, password reset, and email changes. It
//! talks to four collaborators: the [`UserStore`] for records, the
//! [`CredentialHasher`] for every stored secret, the [`TokenIssuer`] for
//! signed tokens, and a [`CodeDispatcher`] for code delivery.
//!
//! Two deliberate choices shape the error surface:
//!
//! - "No such user" and "wrong credential" collapse into one failure per
//!   operation (`InvalidCredentials` for login, `InvalidCode` for code
//!   checks), so responses cannot be used to enumerate accounts.
//! - One session per account: the stored refresh-token hash is overwritten
//!   on login and rotation, and rotation itself is a compare-and-swap, so a
//!   concurrent rotation loses cleanly instead of resurrecting an old
//!   session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::TRACING_TARGET_AUTH;
use crate::code::CodeGenerator;
use crate::dispatch::{CodeDispatcher, CodePurpose};
use crate::error::{AuthError, AuthResult, StoreError};
use crate::hash::CredentialHasher;
use crate::store::{PendingRegistration, PublicUser, UserRecord, UserStore};
use crate::token::TokenIssuer;

/// Confirmation message returned when a verification code was dispatched.
const VERIFICATION_SENT: &str = "a verification code has been sent";

/// Confirmation message for a completed password change.
const PASSWORD_CHANGED: &str = "password changed successfully";

/// A freshly issued access/refresh token pair.
///
/// The `session_id` is minted at login and survives rotations; both token
/// values are replaced on every rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    /// Short-lived token authorizing requests.
    pub access_token: String,
    /// Longer-lived token redeemable for a new pair.
    pub refresh_token: String,
    /// Stable session correlation id.
    pub session_id: String,
    /// Expiry of the access token.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Result of a successful login or token rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    /// The issued token pair.
    pub auth_token: AuthToken,
    /// Sanitized account data.
    pub user_data: PublicUser,
}

/// Input for registering a new account.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    /// Email address to register; the code is dispatched here.
    pub email: String,
    /// Plaintext password, hashed before it reaches the store.
    pub password: String,
    /// Optional phone number (alternate login identifier).
    pub phone: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Orchestrates the account and session-token lifecycle.
///
/// Cheap to clone; operations are stateless and safe to run concurrently.
/// Cross-request consistency for one account relies on the store's
/// conditional updates, not on in-process locking.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    tokens: TokenIssuer,
    codes: CodeGenerator,
    dispatcher: Arc<dyn CodeDispatcher>,
}

impl AuthService {
    /// Creates a new service from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: CredentialHasher,
        tokens: TokenIssuer,
        codes: CodeGenerator,
        dispatcher: Arc<dyn CodeDispatcher>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            codes,
            dispatcher,
        }
    }

    /// Returns the token issuer used by this service.
    #[must_use]
    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Registers an account and dispatches a verification code.
    ///
    /// An existing *active* account with this email fails with `UserExists`;
    /// an inactive one is treated as a stalled registration and its pending
    /// state (password, profile, code) is overwritten. Delivery failures do
    /// not roll back the upsert; the user can request a resend.
    ///
    /// Returns a confirmation message, never the code itself.
    pub async fn register(&self, input: RegisterUser) -> AuthResult<String> {
        let email = normalize_email(&input.email);

        if let Some(existing) = self.store.find_by_email(&email).await?
            && existing.active
        {
            tracing::warn!(
                target: TRACING_TARGET_AUTH,
                email = %email,
                "registration rejected: account already active"
            );
            return Err(AuthError::user_exists());
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let (code, code_hash, expires_at) = self.issue_code()?;

        let registration = PendingRegistration {
            email: email.clone(),
            phone: input.phone,
            first_name: input.first_name,
            last_name: input.last_name,
            password_hash,
            verification_code_hash: code_hash,
            verification_code_expires_at: expires_at,
        };

        let user = self
            .store
            .upsert_pending_registration(registration)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::user_exists(),
                e => AuthError::could_not_create_user().with_source(e),
            })?;

        tracing::info!(
            target: TRACING_TARGET_AUTH,
            user_id = %user.id,
            email = %email,
            "registration stored, dispatching verification code"
        );

        self.dispatch_code(&email, CodePurpose::Registration, &code)
            .await;

        Ok(VERIFICATION_SENT.to_string())
    }

    /// Activates an account with a one-time code.
    ///
    /// Missing user, wrong code, and expired code all fail with the same
    /// `InvalidCode`; an already-active account fails with `UserExists`.
    /// The active check runs before the code check: activation consumes the
    /// code, so a repeated call could not verify it again. Disclosing
    /// "already active" here reveals nothing that `register` does not
    /// already reveal for the same identifier.
    pub async fn activate(&self, identifier: &str, code: &str) -> AuthResult<PublicUser> {
        if let Some(existing) = self.store.find_by_identifier(identifier.trim()).await?
            && existing.active
        {
            return Err(AuthError::user_exists());
        }

        let Some(user) = self.verify_code(identifier, code).await? else {
            return Err(AuthError::invalid_code());
        };

        let activated = self
            .store
            .activate(user.id)
            .await?
            .ok_or_else(|| AuthError::internal("account vanished during activation"))?;

        tracing::info!(
            target: TRACING_TARGET_AUTH,
            user_id = %activated.id,
            "account activated"
        );
        Ok(PublicUser::from(activated))
    }

    /// Authenticates an account and establishes a session.
    ///
    /// Any of "no such user", "account not active", and "wrong password"
    /// yields the same `InvalidCredentials`; a dummy hash verification keeps
    /// the missing-account path as slow as the wrong-password path.
    pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<LoginOutcome> {
        let user = self
            .store
            .find_by_identifier(identifier.trim())
            .await?
            .filter(|u| u.active);

        let Some(user) = user else {
            self.hasher.verify_dummy(password);
            tracing::warn!(
                target: TRACING_TARGET_AUTH,
                identifier = %identifier,
                "login failed: no active account"
            );
            return Err(AuthError::invalid_credentials());
        };

        if !self.hasher.verify(&user.password_hash, password) {
            tracing::warn!(
                target: TRACING_TARGET_AUTH,
                user_id = %user.id,
                "login failed: password mismatch"
            );
            return Err(AuthError::invalid_credentials());
        }

        let session_id = self.codes.new_session_id();
        let auth_token = self.issue_auth_token(&user, &session_id)?;

        let token_hash = self.hasher.hash(&auth_token.refresh_token)?;
        if !self
            .store
            .store_refresh_token_hash(user.id, token_hash)
            .await?
        {
            return Err(AuthError::internal("failed to persist session"));
        }

        tracing::info!(
            target: TRACING_TARGET_AUTH,
            user_id = %user.id,
            session_id = %auth_token.session_id,
            "login successful"
        );

        Ok(LoginOutcome {
            auth_token,
            user_data: PublicUser::from(user),
        })
    }

    /// Rotates a refresh token, keeping the session identity stable.
    ///
    /// The presented token must verify cryptographically *and* hash-match
    /// the stored value; a mismatch means reuse of a superseded token (or a
    /// lost race against a concurrent rotation) and fails with
    /// `TokenInvalid`. Both token values are replaced; the session id is
    /// carried over from the presented token's claims.
    pub async fn reset_tokens(&self, refresh_token: &str) -> AuthResult<LoginOutcome> {
        let (user, claims) = self.validate_refresh_token(refresh_token).await?;

        let auth_token = self.issue_auth_token(&user, &claims.session_id)?;
        let new_hash = self.hasher.hash(&auth_token.refresh_token)?;

        // Compare-and-swap on the stored hash: if another rotation got there
        // first, this one fails instead of silently overwriting it.
        let swapped = self
            .store
            .swap_refresh_token_hash(user.id, &user.hashed_refresh_token, new_hash)
            .await?;
        if !swapped {
            tracing::warn!(
                target: TRACING_TARGET_AUTH,
                user_id = %user.id,
                session_id = %claims.session_id,
                "token rotation lost a concurrent update"
            );
            return Err(AuthError::token_invalid(
                "refresh token no longer matches the active session",
            ));
        }

        tracing::debug!(
            target: TRACING_TARGET_AUTH,
            user_id = %user.id,
            session_id = %claims.session_id,
            "tokens rotated"
        );

        Ok(LoginOutcome {
            auth_token,
            user_data: PublicUser::from(user),
        })
    }

    /// Ends the session bound to this refresh token.
    ///
    /// Clears the stored hash so no future rotation succeeds until the next
    /// login.
    pub async fn log_out(&self, refresh_token: &str) -> AuthResult<bool> {
        let (user, claims) = self.validate_refresh_token(refresh_token).await?;

        let cleared = self
            .store
            .swap_refresh_token_hash(user.id, &user.hashed_refresh_token, String::new())
            .await?;
        if !cleared {
            return Err(AuthError::internal("failed to clear session"));
        }

        tracing::info!(
            target: TRACING_TARGET_AUTH,
            user_id = %user.id,
            session_id = %claims.session_id,
            "logged out"
        );
        Ok(true)
    }

    /// Issues a password-reset code to an active account.
    pub async fn send_reset_code(&self, email: &str) -> AuthResult<String> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_by_email(&email)
            .await?
            .filter(|u| u.active)
            .ok_or_else(AuthError::user_not_found)?;

        let (code, code_hash, expires_at) = self.issue_code()?;
        if !self
            .store
            .set_verification_code(user.id, code_hash, expires_at)
            .await?
        {
            return Err(AuthError::internal("failed to store reset code"));
        }

        self.dispatch_code(&email, CodePurpose::PasswordReset, &code)
            .await;

        Ok(VERIFICATION_SENT.to_string())
    }

    /// Resets a password with a one-time code.
    ///
    /// Also clears the stored refresh-token hash: every device is signed out
    /// and must log in with the new password.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AuthResult<bool> {
        let Some(user) = self.verify_code(email, code).await? else {
            return Err(AuthError::invalid_code());
        };

        let password_hash = self.hasher.hash(new_password)?;
        if !self
            .store
            .update_password(user.id, password_hash, true)
            .await?
        {
            return Err(AuthError::internal("failed to update password"));
        }

        tracing::info!(
            target: TRACING_TARGET_AUTH,
            user_id = %user.id,
            "password reset, sessions revoked"
        );
        Ok(true)
    }

    /// Changes the password of an authenticated user.
    ///
    /// Unlike [`reset_password`](Self::reset_password) this proves control
    /// of the old password instead of an emailed code, and keeps the current
    /// session alive.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<String> {
        if old_password == new_password {
            return Err(AuthError::invalid_input(
                "new password must differ from the old one",
            ));
        }

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .filter(|u| u.active)
            .ok_or_else(AuthError::user_not_found)?;

        if !self.hasher.verify(&user.password_hash, old_password) {
            return Err(AuthError::invalid_credentials());
        }

        let password_hash = self.hasher.hash(new_password)?;
        if !self
            .store
            .update_password(user.id, password_hash, false)
            .await?
        {
            return Err(AuthError::internal("failed to update password"));
        }

        Ok(PASSWORD_CHANGED.to_string())
    }

    /// Stages an email change and dispatches a code to the new address.
    ///
    /// The pending address and the code live on the *current* record: the
    /// code proves control of the new mailbox, while the account it applies
    /// to is already fixed.
    pub async fn request_email_change(
        &self,
        user_id: Uuid,
        new_email: &str,
    ) -> AuthResult<String> {
        let new_email = normalize_email(new_email);

        if self.store.email_taken_by_active(&new_email).await? {
            return Err(AuthError::user_exists());
        }

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(AuthError::user_not_found)?;

        if user.email.as_deref() == Some(new_email.as_str()) {
            return Err(AuthError::invalid_input(
                "new email matches the current one",
            ));
        }

        let (code, code_hash, expires_at) = self.issue_code()?;
        self.store
            .stage_email_change(user.id, new_email.clone(), code_hash, expires_at)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::user_exists(),
                e => AuthError::from(e),
            })?
            .then_some(())
            .ok_or_else(|| AuthError::internal("failed to stage email change"))?;

        self.dispatch_code(&new_email, CodePurpose::EmailChange, &code)
            .await;

        Ok(VERIFICATION_SENT.to_string())
    }

    /// Confirms a staged email change with the dispatched code.
    pub async fn verify_email_change(&self, user_id: Uuid, code: &str) -> AuthResult<bool> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(AuthError::user_not_found)?;

        let Some(email) = user.email.as_deref() else {
            return Err(AuthError::invalid_input("account has no email address"));
        };
        if user.new_email.is_none() {
            return Err(AuthError::invalid_input("no email change is pending"));
        }

        if self.verify_code(email, code).await?.is_none() {
            return Err(AuthError::invalid_code());
        }

        let updated = self
            .store
            .commit_email_change(user.id)
            .await?
            .ok_or_else(|| AuthError::internal("failed to commit email change"))?;

        tracing::info!(
            target: TRACING_TARGET_AUTH,
            user_id = %updated.id,
            "email address updated"
        );
        Ok(true)
    }

    /// Resolves the account behind an access token, if any.
    ///
    /// Read-side authorization helper for the request boundary: returns
    /// `None` on any failure (bad signature, expiry, missing account)
    /// instead of distinguishing them.
    pub async fn user_from_access_token(&self, token: &str) -> Option<UserRecord> {
        let claims = self.tokens.verify_access_token(token).ok()?;
        self.user_for_claims(&claims).await
    }

    /// Resolves the account behind already-verified claims, if it exists.
    pub async fn user_for_claims(&self, claims: &crate::token::TokenClaims) -> Option<UserRecord> {
        self.store.find_by_id(claims.user_id).await.ok().flatten()
    }

    /// Checks a one-time code against the account behind `identifier`.
    ///
    /// Resolves by email first, then phone. Returns `None` when the user is
    /// absent, no code is pending, the hash does not match, or the code has
    /// expired; the caller cannot tell these cases apart. On success the
    /// returned record has its secret fields blanked.
    async fn verify_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> AuthResult<Option<UserRecord>> {
        let Some(user) = self.store.find_by_identifier(identifier.trim()).await? else {
            tracing::debug!(
                target: TRACING_TARGET_AUTH,
                "code verification failed: unknown identifier"
            );
            return Ok(None);
        };

        if !user.has_pending_code()
            || !self.hasher.verify(&user.verification_code_hash, code)
            || user.code_expired(OffsetDateTime::now_utc())
        {
            tracing::debug!(
                target: TRACING_TARGET_AUTH,
                user_id = %user.id,
                "code verification failed: mismatch or expired"
            );
            return Ok(None);
        }

        Ok(Some(user.sanitized()))
    }

    /// Verifies a refresh token and loads the matching account.
    ///
    /// Shared by rotation and logout: signature/expiry via the issuer, then
    /// the stored-hash match that makes the database the source of truth.
    async fn validate_refresh_token(
        &self,
        refresh_token: &str,
    ) -> AuthResult<(UserRecord, crate::token::TokenClaims)> {
        let claims = self.tokens.verify_refresh_token(refresh_token)?;

        let user = self
            .store
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(AuthError::user_not_found)?;

        if !user.has_session() || !self.hasher.verify(&user.hashed_refresh_token, refresh_token)
        {
            tracing::warn!(
                target: TRACING_TARGET_AUTH,
                user_id = %user.id,
                session_id = %claims.session_id,
                "refresh token does not match the stored session"
            );
            return Err(AuthError::token_invalid(
                "refresh token does not match the active session",
            ));
        }

        Ok((user, claims))
    }

    /// Issues a token pair for `user` under the given session id.
    fn issue_auth_token(&self, user: &UserRecord, session_id: &str) -> AuthResult<AuthToken> {
        let (access_token, expires_at) =
            self.tokens
                .sign_access_token(user.id, session_id, user.role)?;
        let (refresh_token, _) = self
            .tokens
            .sign_refresh_token(user.id, session_id, user.role)?;

        Ok(AuthToken {
            access_token,
            refresh_token,
            session_id: session_id.to_owned(),
            expires_at,
        })
    }

    /// Generates a code and returns `(plaintext, hash, expiry)`.
    fn issue_code(&self) -> AuthResult<(String, String, OffsetDateTime)> {
        let code = self.codes.generate();
        let code_hash = self.hasher.hash(&code)?;
        let expires_at = OffsetDateTime::now_utc() + self.codes.ttl();
        Ok((code, code_hash, expires_at))
    }

    /// Best-effort code delivery; failures are logged, never propagated.
    async fn dispatch_code(&self, recipient: &str, purpose: CodePurpose, code: &str) {
        if let Err(e) = self.dispatcher.send_code(recipient, purpose, code).await {
            tracing::warn!(
                target: TRACING_TARGET_AUTH,
                recipient = %recipient,
                error = %e,
                "verification code delivery failed; user may request a resend"
            );
        }
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("codes", &self.codes)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::code::CodeGenerator;
    use crate::dispatch::RecordingDispatcher;
    use crate::error::AuthErrorKind;
    use crate::store::MemoryUserStore;
    use crate::token::{TokenConfig, TokenIssuer};

    const SECRET: &str = "an-adequately-long-signing-secret-for-tests";

    struct Harness {
        service: AuthService,
        store: Arc<MemoryUserStore>,
        dispatcher: Arc<RecordingDispatcher>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryUserStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let service = AuthService::new(
            store.clone(),
            CredentialHasher::new().expect("hasher"),
            TokenIssuer::new(SECRET, TokenConfig::default()).expect("issuer"),
            CodeGenerator::new(),
            dispatcher.clone(),
        );
        Harness {
            service,
            store,
            dispatcher,
        }
    }

    fn register_input(email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            email: email.to_string(),
            password: password.to_string(),
            phone: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    async fn registered_active_user(h: &Harness, email: &str, password: &str) -> Uuid {
        h.service
            .register(register_input(email, password))
            .await
            .expect("register");
        let code = h.dispatcher.last_code_for(email).expect("code dispatched");
        let user = h.service.activate(email, &code).await.expect("activate");
        user.id
    }

    #[tokio::test]
    async fn activation_succeeds_exactly_once() -> anyhow::Result<()> {
        let h = harness();
        h.service.register(register_input("a@x.com", "pw123456")).await?;

        let stored = h.store.find_by_email("a@x.com").await?.expect("stored");
        assert!(!stored.active);

        let code = h.dispatcher.last_code_for("a@x.com").expect("code");
        let user = h.service.activate("a@x.com", &code).await?;
        assert!(user.active);

        // A second activation attempt reports the account as existing.
        let err = h.service.activate("a@x.com", &code).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::UserExists);

        Ok(())
    }

    #[tokio::test]
    async fn activation_with_wrong_code_fails() -> anyhow::Result<()> {
        let h = harness();
        h.service.register(register_input("a@x.com", "pw123456")).await?;

        let code = h.dispatcher.last_code_for("a@x.com").expect("code");
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = h.service.activate("a@x.com", wrong).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCode);

        // Unknown identifiers produce the identical failure.
        let err = h.service.activate("ghost@x.com", &code).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCode);

        Ok(())
    }

    #[tokio::test]
    async fn activation_with_expired_code_fails() -> anyhow::Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        // Zero TTL: every code is already expired when checked.
        let service = AuthService::new(
            store.clone(),
            CredentialHasher::new()?,
            TokenIssuer::new(SECRET, TokenConfig::default())?,
            CodeGenerator::with_ttl(time::Duration::ZERO),
            dispatcher.clone(),
        );

        service.register(register_input("a@x.com", "pw123456")).await?;
        let code = dispatcher.last_code_for("a@x.com").expect("code");

        let err = service.activate("a@x.com", &code).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCode);

        Ok(())
    }

    #[tokio::test]
    async fn registration_retry_reissues_the_code() -> anyhow::Result<()> {
        let h = harness();
        h.service.register(register_input("a@x.com", "pw123456")).await?;
        let first_code = h.dispatcher.last_code_for("a@x.com").expect("code");

        // Retry before activation: pending state is overwritten.
        h.service.register(register_input("a@x.com", "other-pass")).await?;
        let second_code = h.dispatcher.last_code_for("a@x.com").expect("code");

        // The first code is superseded (codes can rarely collide; only the
        // stored hash decides).
        if first_code != second_code {
            let err = h.service.activate("a@x.com", &first_code).await.unwrap_err();
            assert_eq!(err.kind(), AuthErrorKind::InvalidCode);
        }
        let user = h.service.activate("a@x.com", &second_code).await?;
        assert!(user.active);

        // The retry's password is the one that counts.
        assert!(h.service.login("a@x.com", "other-pass").await.is_ok());
        let err = h.service.login("a@x.com", "pw123456").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCredentials);

        Ok(())
    }

    #[tokio::test]
    async fn registering_an_active_account_fails() -> anyhow::Result<()> {
        let h = harness();
        registered_active_user(&h, "a@x.com", "pw123456").await;

        let err = h
            .service
            .register(register_input("a@x.com", "pw123456"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::UserExists);

        Ok(())
    }

    #[tokio::test]
    async fn registration_survives_delivery_failure() -> anyhow::Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let service = AuthService::new(
            store.clone(),
            CredentialHasher::new()?,
            TokenIssuer::new(SECRET, TokenConfig::default())?,
            CodeGenerator::new(),
            Arc::new(RecordingDispatcher::failing()),
        );

        // Dispatch fails, but the registration is persisted anyway.
        service.register(register_input("a@x.com", "pw123456")).await?;
        assert!(store.find_by_email("a@x.com").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn login_requires_an_active_account() -> anyhow::Result<()> {
        let h = harness();
        h.service.register(register_input("a@x.com", "pw123456")).await?;

        // Not yet activated: same failure as a wrong password.
        let err = h.service.login("a@x.com", "pw123456").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCredentials);

        let err = h.service.login("ghost@x.com", "pw123456").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCredentials);

        Ok(())
    }

    #[tokio::test]
    async fn login_returns_sanitized_user_and_tokens() -> anyhow::Result<()> {
        let h = harness();
        registered_active_user(&h, "a@x.com", "pw123456").await;

        let outcome = h.service.login("a@x.com", "pw123456").await?;
        assert!(!outcome.auth_token.access_token.is_empty());
        assert!(!outcome.auth_token.refresh_token.is_empty());
        assert_eq!(outcome.user_data.email.as_deref(), Some("a@x.com"));

        // PublicUser cannot carry hashes; check the record-level invariant
        // through serialization as well.
        let json = serde_json::to_string(&outcome.user_data)?;
        assert!(!json.contains("password"));
        assert!(!json.contains("hash"));
        assert!(!json.contains("refresh"));

        Ok(())
    }

    #[tokio::test]
    async fn login_by_phone_identifier() -> anyhow::Result<()> {
        let h = harness();
        let mut input = register_input("a@x.com", "pw123456");
        input.phone = Some("+15550100".to_string());
        h.service.register(input).await?;
        let code = h.dispatcher.last_code_for("a@x.com").expect("code");
        h.service.activate("a@x.com", &code).await?;

        assert!(h.service.login("+15550100", "pw123456").await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn rotation_preserves_session_and_invalidates_old_token() -> anyhow::Result<()> {
        let h = harness();
        registered_active_user(&h, "a@x.com", "pw123456").await;

        let login = h.service.login("a@x.com", "pw123456").await?;
        let first = login.auth_token;

        let rotated = h.service.reset_tokens(&first.refresh_token).await?;
        let second = rotated.auth_token;

        assert_eq!(first.session_id, second.session_id);
        assert_ne!(first.refresh_token, second.refresh_token);

        // The superseded token no longer matches the stored hash.
        let err = h.service.reset_tokens(&first.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::TokenInvalid);

        // The fresh one still works.
        assert!(h.service.reset_tokens(&second.refresh_token).await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn rotation_rejects_garbage_tokens() -> anyhow::Result<()> {
        let h = harness();
        let err = h.service.reset_tokens("not-a-jwt").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::TokenInvalid);
        Ok(())
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() -> anyhow::Result<()> {
        let h = harness();
        registered_active_user(&h, "a@x.com", "pw123456").await;

        let login = h.service.login("a@x.com", "pw123456").await?;
        let token = login.auth_token.refresh_token;

        assert!(h.service.log_out(&token).await?);

        // The cleared hash rejects both rotation and a second logout.
        let err = h.service.reset_tokens(&token).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::TokenInvalid);
        let err = h.service.log_out(&token).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::TokenInvalid);

        Ok(())
    }

    #[tokio::test]
    async fn login_elsewhere_supersedes_the_previous_session() -> anyhow::Result<()> {
        let h = harness();
        registered_active_user(&h, "a@x.com", "pw123456").await;

        let first = h.service.login("a@x.com", "pw123456").await?;
        let second = h.service.login("a@x.com", "pw123456").await?;

        // Single-session model: only the latest refresh token is honored.
        let err = h
            .service
            .reset_tokens(&first.auth_token.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::TokenInvalid);
        assert!(h
            .service
            .reset_tokens(&second.auth_token.refresh_token)
            .await
            .is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn password_reset_revokes_sessions() -> anyhow::Result<()> {
        let h = harness();
        registered_active_user(&h, "a@x.com", "pw123456").await;
        let login = h.service.login("a@x.com", "pw123456").await?;

        h.service.send_reset_code("a@x.com").await?;
        let code = h.dispatcher.last_code_for("a@x.com").expect("code");
        assert!(h.service.reset_password("a@x.com", &code, "brand-new-pw").await?);

        // Old refresh token no longer validates; old password is gone.
        let err = h
            .service
            .reset_tokens(&login.auth_token.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::TokenInvalid);
        let err = h.service.login("a@x.com", "pw123456").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCredentials);
        assert!(h.service.login("a@x.com", "brand-new-pw").await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn reset_code_requires_an_active_account() -> anyhow::Result<()> {
        let h = harness();
        h.service.register(register_input("a@x.com", "pw123456")).await?;

        let err = h.service.send_reset_code("a@x.com").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::UserNotFound);
        let err = h.service.send_reset_code("ghost@x.com").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::UserNotFound);

        Ok(())
    }

    #[tokio::test]
    async fn change_password_checks_the_old_one() -> anyhow::Result<()> {
        let h = harness();
        let user_id = registered_active_user(&h, "a@x.com", "pw123456").await;

        let err = h
            .service
            .change_password(user_id, "pw123456", "pw123456")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidInput);

        let err = h
            .service
            .change_password(user_id, "wrong-old", "fresh-password")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidCredentials);

        h.service
            .change_password(user_id, "pw123456", "fresh-password")
            .await?;
        assert!(h.service.login("a@x.com", "fresh-password").await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn email_change_flow() -> anyhow::Result<()> {
        let h = harness();
        let user_id = registered_active_user(&h, "a@x.com", "pw123456").await;

        h.service.request_email_change(user_id, "b@x.com").await?;
        // The code goes to the new address but applies to the account.
        let code = h.dispatcher.last_code_for("b@x.com").expect("code");

        assert!(h.service.verify_email_change(user_id, &code).await?);

        let user = h.store.find_by_id(user_id).await?.expect("user");
        assert_eq!(user.email.as_deref(), Some("b@x.com"));
        assert_eq!(user.new_email, None);
        assert!(h.service.login("b@x.com", "pw123456").await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn email_change_rejects_taken_or_unchanged_addresses() -> anyhow::Result<()> {
        let h = harness();
        let user_id = registered_active_user(&h, "a@x.com", "pw123456").await;
        registered_active_user(&h, "taken@x.com", "pw123456").await;

        let err = h
            .service
            .request_email_change(user_id, "taken@x.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::UserExists);

        let err = h
            .service
            .request_email_change(user_id, "a@x.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidInput);

        let err = h
            .service
            .verify_email_change(user_id, "123456")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidInput); // nothing pending

        Ok(())
    }

    #[tokio::test]
    async fn user_from_access_token_is_a_quiet_option() -> anyhow::Result<()> {
        let h = harness();
        registered_active_user(&h, "a@x.com", "pw123456").await;
        let login = h.service.login("a@x.com", "pw123456").await?;

        let user = h
            .service
            .user_from_access_token(&login.auth_token.access_token)
            .await
            .expect("valid token resolves");
        assert_eq!(user.email.as_deref(), Some("a@x.com"));

        assert!(h.service.user_from_access_token("garbage").await.is_none());
        // A refresh token is not an access token.
        assert!(h
            .service
            .user_from_access_token(&login.auth_token.refresh_token)
            .await
            .is_none());

        Ok(())
    }

    /// The end-to-end scenario from the service contract: register,
    /// activate, login, rotate, logout.
    #[tokio::test]
    async fn full_lifecycle_scenario() -> anyhow::Result<()> {
        let h = harness();

        let message = h.service.register(register_input("a@x.com", "pw123456")).await?;
        assert!(!message.is_empty());
        let stored = h.store.find_by_email("a@x.com").await?.expect("stored");
        assert!(!stored.active);

        let code = h.dispatcher.last_code_for("a@x.com").expect("dispatched");
        let activated = h.service.activate("a@x.com", &code).await?;
        assert!(activated.active);

        let login = h.service.login("a@x.com", "pw123456").await?;
        assert!(!login.auth_token.access_token.is_empty());
        assert!(!login.auth_token.refresh_token.is_empty());

        let rotated = h.service.reset_tokens(&login.auth_token.refresh_token).await?;
        assert_ne!(
            rotated.auth_token.refresh_token,
            login.auth_token.refresh_token
        );
        assert_eq!(rotated.auth_token.session_id, login.auth_token.session_id);

        assert!(h.service.log_out(&rotated.auth_token.refresh_token).await?);
        assert!(h
            .service
            .reset_tokens(&rotated.auth_token.refresh_token)
            .await
            .is_err());

        Ok(())
    }
}
