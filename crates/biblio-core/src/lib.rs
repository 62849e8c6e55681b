#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging.

/// Tracing target for authentication lifecycle operations.
pub const TRACING_TARGET_AUTH: &str = "biblio_core::auth";

/// Tracing target for credential hashing operations.
pub const TRACING_TARGET_HASH: &str = "biblio_core::hash";

/// Tracing target for token signing and verification.
pub const TRACING_TARGET_TOKEN: &str = "biblio_core::token";

/// Tracing target for one-time code delivery.
pub const TRACING_TARGET_DISPATCH: &str = "biblio_core::dispatch";

pub mod auth;
pub mod code;
pub mod dispatch;
mod error;
pub mod hash;
pub mod store;
pub mod token;

pub use crate::auth::{AuthService, AuthToken, LoginOutcome, RegisterUser};
pub use crate::code::CodeGenerator;
pub use crate::dispatch::{
    CodeDispatcher, CodePurpose, RecordingDispatcher, SentCode, SmtpConfig, SmtpDispatcher,
};
pub use crate::error::{
    AuthError, AuthErrorKind, AuthResult, BoxedError, StoreError, StoreResult,
};
pub use crate::hash::CredentialHasher;
pub use crate::store::{
    MemoryUserStore, PendingRegistration, PublicUser, Role, UserRecord, UserStore,
};
pub use crate::token::{TokenClaims, TokenConfig, TokenIssuer};
