//! Authentication guard for private routes.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::extract::AuthState;

/// Requires a valid, store-verified authentication token to proceed.
///
/// #### Notes
///
/// - [`AccessClaims`](crate::extract::AccessClaims) can't be extracted from
///   requests without an `Authorization` header.
/// - [`AuthState`] can't be extracted without a *verified* token whose
///   account still exists.
///
/// The extracted state is cached in the request extensions, so handlers
/// behind this guard extract [`AuthState`] again for free.
pub async fn require_authentication(
    AuthState(_): AuthState,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}
