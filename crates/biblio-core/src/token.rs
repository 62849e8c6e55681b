//! Signed session tokens: issuance, rotation support, and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with one shared secret but
//! separated by audience, so a refresh token can never be replayed where an
//! access token is expected (or vice versa). Claims carry the account id, the
//! session id that stays stable across rotations, and the account role.
//!
//! # Claims
//!
//! | Claim | Field | Description |
//! |-------|-------|-------------|
//! | `iss` | `issued_by` | Token issuer identifier |
//! | `aud` | `audience` | `biblio:access` or `biblio:refresh` |
//! | `jti` | `token_id` | Unique id of this token value |
//! | `sub` | `user_id` | Account the token represents |
//! | `sid` | `session_id` | Stable session correlation id |
//! | `rol` | `role` | Account role at issuance |
//! | `iat` / `exp` | `issued_at` / `expires_at` | Unix-seconds timestamps |

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::TRACING_TARGET_TOKEN;
use crate::error::{AuthError, AuthResult};
use crate::store::Role;

/// Default JWT issuer identifier.
const JWT_ISSUER: &str = "biblio";
/// Audience restricting a token to request authorization.
const ACCESS_AUDIENCE: &str = "biblio:access";
/// Audience restricting a token to session renewal.
const REFRESH_AUDIENCE: &str = "biblio:refresh";

/// Token lifetime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenConfig {
    /// Lifetime of access tokens.
    pub access_ttl: Duration,
    /// Lifetime of refresh tokens.
    pub refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        }
    }
}

/// JWT claims for both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer (who created the token).
    #[serde(rename = "iss")]
    issued_by: String,
    /// Audience (what the token may be used for).
    #[serde(rename = "aud")]
    audience: String,

    /// Unique identifier of this token value.
    #[serde(rename = "jti")]
    pub token_id: Uuid,
    /// Account this token represents.
    #[serde(rename = "sub")]
    pub user_id: Uuid,
    /// Session correlation id, stable across rotations.
    #[serde(rename = "sid")]
    pub session_id: String,
    /// Account role at issuance time.
    #[serde(rename = "rol")]
    pub role: Role,

    /// Issued at (unix seconds).
    #[serde(rename = "iat")]
    #[serde(with = "time::serde::timestamp")]
    pub issued_at: OffsetDateTime,
    /// Expiration time (unix seconds).
    #[serde(rename = "exp")]
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl TokenClaims {
    /// Checks if the token has expired based on current UTC time.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }

    /// Returns the remaining lifetime, or zero if already expired.
    #[inline]
    #[must_use]
    pub fn remaining_lifetime(&self) -> Duration {
        let remaining = self.expires_at - OffsetDateTime::now_utc();
        if remaining.is_positive() {
            remaining
        } else {
            Duration::ZERO
        }
    }
}

/// Signs and verifies access and refresh tokens.
///
/// Cheap to clone; holds the derived encoding/decoding keys and the TTL
/// configuration.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: TokenConfig,
}

impl TokenIssuer {
    /// Creates a new issuer from a shared secret.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the secret is too short to be taken
    /// seriously (under 32 bytes).
    pub fn new(secret: &str, config: TokenConfig) -> AuthResult<Self> {
        if secret.len() < 32 {
            return Err(AuthError::internal(
                "token signing secret must be at least 32 bytes",
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            config,
        })
    }

    /// Returns the configured token lifetimes.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> TokenConfig {
        self.config
    }

    /// Signs an access token for the given account and session.
    ///
    /// Returns the encoded token and its expiry timestamp.
    pub fn sign_access_token(
        &self,
        user_id: Uuid,
        session_id: &str,
        role: Role,
    ) -> AuthResult<(String, OffsetDateTime)> {
        self.sign(user_id, session_id, role, ACCESS_AUDIENCE, self.config.access_ttl)
    }

    /// Signs a refresh token for the given account and session.
    pub fn sign_refresh_token(
        &self,
        user_id: Uuid,
        session_id: &str,
        role: Role,
    ) -> AuthResult<(String, OffsetDateTime)> {
        self.sign(user_id, session_id, role, REFRESH_AUDIENCE, self.config.refresh_ttl)
    }

    /// Verifies an access token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthErrorKind::TokenExpired`] or
    /// [`AuthErrorKind::TokenInvalid`].
    ///
    /// [`AuthErrorKind::TokenExpired`]: crate::error::AuthErrorKind::TokenExpired
    /// [`AuthErrorKind::TokenInvalid`]: crate::error::AuthErrorKind::TokenInvalid
    pub fn verify_access_token(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(token, ACCESS_AUDIENCE)
    }

    /// Verifies a refresh token and returns its claims.
    pub fn verify_refresh_token(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(token, REFRESH_AUDIENCE)
    }

    fn sign(
        &self,
        user_id: Uuid,
        session_id: &str,
        role: Role,
        audience: &str,
        ttl: Duration,
    ) -> AuthResult<(String, OffsetDateTime)> {
        let issued_at = OffsetDateTime::now_utc();
        let expires_at = issued_at + ttl;

        let claims = TokenClaims {
            issued_by: JWT_ISSUER.to_owned(),
            audience: audience.to_owned(),
            token_id: Uuid::new_v4(),
            user_id,
            session_id: session_id.to_owned(),
            role,
            issued_at,
            expires_at,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_TOKEN,
                    error = %e,
                    user_id = %user_id,
                    "failed to encode token"
                );
                AuthError::internal("token generation failed")
            })?;

        Ok((token, expires_at))
    }

    fn verify(&self, token: &str, audience: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = true;
        validation.set_audience(&[audience]);
        validation.set_issuer(&[JWT_ISSUER]);
        // Presence of `jti`/`sid`/`iat` is enforced by deserialization into
        // [`TokenClaims`]; the spec-claim list covers the rest.
        validation.set_required_spec_claims(&["iss", "aud", "sub", "exp"]);

        let token_data =
            decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(map_jwt_error)?;
        let claims = token_data.claims;

        // Double-check expiry; the library check runs with leeway.
        if claims.is_expired() {
            tracing::debug!(
                target: TRACING_TARGET_TOKEN,
                token_id = %claims.token_id,
                user_id = %claims.user_id,
                expired_at = %claims.expires_at,
                "token validation failed: expired"
            );
            return Err(AuthError::token_expired());
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Maps jsonwebtoken failures onto the core error taxonomy.
fn map_jwt_error(error: JwtError) -> AuthError {
    match error.kind() {
        JwtErrorKind::ExpiredSignature => AuthError::token_expired(),
        JwtErrorKind::InvalidSignature => {
            AuthError::token_invalid("token signature could not be verified")
        }
        JwtErrorKind::InvalidAudience => {
            AuthError::token_invalid("token is not valid for this purpose")
        }
        JwtErrorKind::InvalidIssuer => {
            AuthError::token_invalid("token was not issued by this service")
        }
        JwtErrorKind::MissingRequiredClaim(claim) => {
            AuthError::token_invalid(format!("token is missing required claim: {claim}"))
        }
        _ => AuthError::token_invalid("token is malformed").with_source(error),
    }
}
