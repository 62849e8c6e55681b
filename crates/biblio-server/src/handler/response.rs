//! HTTP response shapes shared across handlers.

use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Simple confirmation payload for operations that return a message.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// Human-readable confirmation.
    pub message: String,
}

impl MessageResponse {
    /// Creates a new message response.
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// HTTP error response representation with security-conscious design.
///
/// This struct contains all the information needed to serialize an error
/// response: the error name, a user-safe message, optional resource
/// information, and debugging context.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse<'a> {
    /// The error name/type identifier.
    pub name: Cow<'a, str>,
    /// User-friendly error message safe for client display.
    pub message: Cow<'a, str>,
    /// The resource that the error relates to (optional, set by handler).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Cow<'a, str>>,
    /// Internal context for debugging (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Cow<'a, str>>,
    /// HTTP status code (not serialized in JSON).
    #[serde(skip)]
    pub status: StatusCode,
}

impl<'a> ErrorResponse<'a> {
    // 4xx Client Errors
    pub const BAD_REQUEST: Self = Self::new(
        "bad_request",
        "The request could not be processed due to invalid data",
        StatusCode::BAD_REQUEST,
    );
    pub const USER_EXISTS: Self = Self::new(
        "user_exists",
        "An account with this identifier already exists",
        StatusCode::BAD_REQUEST,
    );
    pub const INVALID_CODE: Self = Self::new(
        "invalid_code",
        "The verification code is wrong or has expired",
        StatusCode::BAD_REQUEST,
    );
    pub const INVALID_CREDENTIALS: Self = Self::new(
        "invalid_credentials",
        "Invalid identifier or password",
        StatusCode::BAD_REQUEST,
    );
    pub const MISSING_AUTH_TOKEN: Self = Self::new(
        "missing_auth_token",
        "Authentication is required to access this resource",
        StatusCode::UNAUTHORIZED,
    );
    pub const MALFORMED_AUTH_TOKEN: Self = Self::new(
        "malformed_auth_token",
        "The authentication token format is invalid",
        StatusCode::UNAUTHORIZED,
    );
    pub const TOKEN_EXPIRED: Self = Self::new(
        "token_expired",
        "The token has expired",
        StatusCode::UNAUTHORIZED,
    );
    pub const TOKEN_INVALID: Self = Self::new(
        "token_invalid",
        "The token could not be verified",
        StatusCode::UNAUTHORIZED,
    );
    pub const UNAUTHORIZED: Self = Self::new(
        "unauthorized",
        "Invalid or expired authentication credentials",
        StatusCode::UNAUTHORIZED,
    );
    pub const FORBIDDEN: Self = Self::new(
        "forbidden",
        "You don't have permission to access this resource",
        StatusCode::FORBIDDEN,
    );
    pub const NOT_FOUND: Self = Self::new(
        "not_found",
        "The requested resource was not found",
        StatusCode::NOT_FOUND,
    );
    pub const USER_NOT_FOUND: Self = Self::new(
        "user_not_found",
        "No matching account was found",
        StatusCode::NOT_FOUND,
    );

    // 5xx Server Errors
    pub const COULD_NOT_CREATE_USER: Self = Self::new(
        "could_not_create_user",
        "The account could not be created. Please try again later",
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(
        "internal_server_error",
        "An internal server error occurred. Please try again later",
        StatusCode::INTERNAL_SERVER_ERROR,
    );

    /// Creates a new error response.
    #[inline]
    pub const fn new(name: &'a str, message: &'a str, status: StatusCode) -> Self {
        Self {
            name: Cow::Borrowed(name),
            message: Cow::Borrowed(message),
            resource: None,
            context: None,
            status,
        }
    }

    /// Sets a custom resource on the error response.
    pub fn with_resource(mut self, resource: impl Into<Cow<'a, str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Replaces the default message with a custom one.
    pub fn with_message(mut self, message: impl Into<Cow<'a, str>>) -> Self {
        self.message = message.into();
        self
    }

    /// Attaches context to the error response.
    /// If context already exists, it merges them with a separator.
    pub fn with_context(mut self, context: impl Into<Cow<'a, str>>) -> Self {
        let new_context = context.into();
        self.context = Some(match self.context {
            Some(existing) => Cow::Owned(format!("{existing}; {new_context}")),
            None => new_context,
        });
        self
    }
}

impl Default for ErrorResponse<'_> {
    #[inline]
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ErrorResponse<'_> {
    #[inline]
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_merging_context() {
        let response = ErrorResponse::INTERNAL_SERVER_ERROR
            .with_context("database connection failed")
            .with_context("retry attempted");

        assert_eq!(
            response.context.as_deref(),
            Some("database connection failed; retry attempted")
        );
    }

    #[test]
    fn custom_message_replaces_default() {
        let response = ErrorResponse::BAD_REQUEST.with_message("new email matches the current one");
        assert_eq!(&response.message, "new email matches the current one");
    }

    #[test]
    fn statuses_match_the_boundary_contract() {
        assert_eq!(ErrorResponse::USER_EXISTS.status, StatusCode::BAD_REQUEST);
        assert_eq!(ErrorResponse::INVALID_CODE.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorResponse::INVALID_CREDENTIALS.status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorResponse::USER_NOT_FOUND.status, StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorResponse::TOKEN_EXPIRED.status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorResponse::COULD_NOT_CREATE_USER.status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
