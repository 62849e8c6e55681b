//! Request extractors with improved error handling and validation.
//!
//! - [`Json`] / [`ValidateJson`] - JSON deserialization with handler-native
//!   rejections and automatic `validator` checks
//! - [`AccessClaims`] - verified access-token claims from the Bearer header
//! - [`AuthState`] - store-verified account behind the access token

mod auth;
mod json;

pub use self::auth::{AccessClaims, AuthState};
pub use self::json::{Json, ValidateJson};
