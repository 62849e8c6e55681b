//! Request middleware.

mod require_auth;

pub use self::require_auth::require_authentication;
