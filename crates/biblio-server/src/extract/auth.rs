//! Access-token extraction and verification.
//!
//! [`AccessClaims`] performs pure token verification (signature, audience,
//! expiry) against the issuer; [`AuthState`] additionally resolves the
//! account from the store, so deleted accounts lose access the moment their
//! record disappears, not when their token expires.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use axum_extra::typed_header::TypedHeaderRejectionReason;
use biblio_core::{AuthService, TokenClaims, TokenIssuer, UserRecord};

use crate::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{Error, ErrorKind, Result};

/// Verified access-token claims from the Authorization Bearer header.
///
/// Validation covers the signature, the access audience, the issuer, and
/// expiry. The claims are cached in the request extensions so stacked
/// extractors parse the token once.
#[must_use]
#[derive(Debug, Clone)]
pub struct AccessClaims(pub TokenClaims);

impl AccessClaims {
    /// Returns the inner claims.
    #[inline]
    pub fn into_inner(self) -> TokenClaims {
        self.0
    }
}

impl<S> FromRequestParts<S> for AccessClaims
where
    S: Send + Sync,
    TokenIssuer: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Return cached claims if available to avoid re-parsing.
        if let Some(claims) = parts.extensions.get::<Self>() {
            return Ok(claims.clone());
        }

        type AuthBearerHeader = TypedHeader<Authorization<Bearer>>;
        let issuer = TokenIssuer::from_ref(state);

        let bearer = match AuthBearerHeader::from_request_parts(parts, state).await {
            Ok(bearer) => bearer,
            Err(rejection) => {
                let error = match rejection.reason() {
                    TypedHeaderRejectionReason::Missing => ErrorKind::MissingAuthToken
                        .with_context("Missing Authorization header with Bearer token"),
                    TypedHeaderRejectionReason::Error(_) => ErrorKind::MalformedAuthToken
                        .with_context("Authorization header must contain a valid Bearer token"),
                    _ => ErrorKind::InternalServerError
                        .with_context("Unexpected error during header extraction"),
                };
                return Err(error.into_static());
            }
        };

        let claims = issuer.verify_access_token(bearer.token()).map_err(|e| {
            tracing::debug!(
                target: TRACING_TARGET_AUTHENTICATION,
                error = %e,
                "access token rejected"
            );
            Error::from(e)
        })?;

        let claims = Self(claims);
        parts.extensions.insert(claims.clone());
        Ok(claims)
    }
}

/// Store-verified authentication state.
///
/// Extracts [`AccessClaims`] and then loads the account record, rejecting
/// tokens whose account no longer exists.
#[must_use]
#[derive(Debug, Clone)]
pub struct AuthState(pub UserRecord);

impl AuthState {
    /// Returns the authenticated account record.
    #[inline]
    pub fn into_inner(self) -> UserRecord {
        self.0
    }
}

impl<S> FromRequestParts<S> for AuthState
where
    S: Send + Sync,
    TokenIssuer: FromRef<S>,
    AuthService: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth_state) = parts.extensions.get::<Self>() {
            return Ok(auth_state.clone());
        }

        let AccessClaims(claims) = AccessClaims::from_request_parts(parts, state).await?;
        let auth_service = AuthService::from_ref(state);

        let Some(user) = auth_service.user_for_claims(&claims).await else {
            tracing::warn!(
                target: TRACING_TARGET_AUTHENTICATION,
                user_id = %claims.user_id,
                "valid token for a missing account"
            );
            return Err(ErrorKind::Unauthorized.into_error());
        };

        let auth_state = Self(user);
        parts.extensions.insert(auth_state.clone());
        Ok(auth_state)
    }
}
