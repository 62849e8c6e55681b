//! Error types for the authentication core.
//!
//! This module provides the tagged error model used by every [`AuthService`]
//! operation, plus the storage error type surfaced by [`UserStore`]
//! implementations:
//!
//! - Strongly-typed error kinds for different failure categories
//! - Builder-style constructors for ergonomic error creation
//! - Type-safe error source tracking with boxed trait objects
//!
//! Expected failures never cross the service boundary as panics; unexpected
//! runtime errors are mapped to [`AuthErrorKind::Internal`] with the original
//! error preserved as a source for logging.
//!
//! [`AuthService`]: crate::auth::AuthService
//! [`UserStore`]: crate::store::UserStore

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// Type alias for boxed errors that are Send + Sync.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for authentication operations.
pub type AuthResult<T, E = AuthError> = std::result::Result<T, E>;

/// Result type alias for user-store operations.
pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing authentication failures.
///
/// This is separated from [`AuthError`] so callers can match on the failure
/// category without inspecting the full error. The HTTP boundary maps each
/// kind to a status code; the core never sees transport codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// An account with this identifier already exists (or is already active).
    UserExists,
    /// No matching account was found.
    UserNotFound,
    /// The one-time code is missing, wrong, or expired.
    ///
    /// Intentionally covers "no such user" as well, so callers cannot probe
    /// which identifiers are registered.
    InvalidCode,
    /// The identifier/password pair did not match an active account.
    ///
    /// Masks "not found" vs "wrong password" for enumeration resistance.
    InvalidCredentials,
    /// The request payload is structurally valid but semantically rejected.
    InvalidInput,
    /// A signed token passed verification of form but has expired.
    TokenExpired,
    /// A signed token failed signature, audience, or session-hash checks.
    TokenInvalid,
    /// The registration upsert did not persist a user record.
    CouldNotCreateUser,
    /// Unexpected internal failure (storage, hashing, signing).
    Internal,
}

impl AuthErrorKind {
    /// Returns the error kind as a stable string for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserExists => "user_exists",
            Self::UserNotFound => "user_not_found",
            Self::InvalidCode => "invalid_code",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidInput => "invalid_input",
            Self::TokenExpired => "token_expired",
            Self::TokenInvalid => "token_invalid",
            Self::CouldNotCreateUser => "could_not_create_user",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication error with structured information.
///
/// Carries the failure kind, a human-readable message safe to surface to
/// clients, and an optional source error kept for logging only.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
#[must_use = "errors do nothing unless handled"]
pub struct AuthError {
    /// The failure category.
    kind: AuthErrorKind,
    /// Human-readable error message.
    message: Cow<'static, str>,
    /// Optional underlying error that caused this failure.
    #[source]
    source: Option<BoxedError>,
}

impl AuthError {
    /// Creates a new [`AuthError`].
    #[inline]
    pub fn new(kind: AuthErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error, enabling error chain tracking.
    #[inline]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a new duplicate-account error.
    #[inline]
    pub fn user_exists() -> Self {
        Self::new(
            AuthErrorKind::UserExists,
            "an account with this identifier already exists",
        )
    }

    /// Creates a new missing-account error.
    #[inline]
    pub fn user_not_found() -> Self {
        Self::new(AuthErrorKind::UserNotFound, "no matching account was found")
    }

    /// Creates a new invalid-code error.
    #[inline]
    pub fn invalid_code() -> Self {
        Self::new(
            AuthErrorKind::InvalidCode,
            "the verification code is wrong or has expired",
        )
    }

    /// Creates a new invalid-credentials error.
    #[inline]
    pub fn invalid_credentials() -> Self {
        Self::new(
            AuthErrorKind::InvalidCredentials,
            "invalid identifier or password",
        )
    }

    /// Creates a new invalid-input error.
    #[inline]
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(AuthErrorKind::InvalidInput, message)
    }

    /// Creates a new expired-token error.
    #[inline]
    pub fn token_expired() -> Self {
        Self::new(AuthErrorKind::TokenExpired, "the token has expired")
    }

    /// Creates a new invalid-token error.
    #[inline]
    pub fn token_invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(AuthErrorKind::TokenInvalid, message)
    }

    /// Creates a new registration-failure error.
    #[inline]
    pub fn could_not_create_user() -> Self {
        Self::new(
            AuthErrorKind::CouldNotCreateUser,
            "the account could not be created",
        )
    }

    /// Creates a new internal error.
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(AuthErrorKind::Internal, message)
    }
}

/// Error type for user-store operations.
///
/// Store implementations translate their backend failures into this narrow
/// shape; the service layer maps everything except conflicts to
/// [`AuthErrorKind::Internal`].
#[derive(Debug, thiserror::Error)]
#[must_use = "storage errors should be handled appropriately"]
pub enum StoreError {
    /// A uniqueness constraint was violated (duplicate email or phone).
    #[error("conflicting record: {0}")]
    Conflict(Cow<'static, str>),

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] BoxedError),
}

impl StoreError {
    /// Creates a new backend error from any error type.
    #[inline]
    pub fn backend(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(source))
    }

    /// Returns whether this error is a uniqueness conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::user_exists().with_source(err),
            StoreError::Backend(_) => {
                AuthError::internal("user storage is unavailable").with_source(err)
            }
        }
    }
}
