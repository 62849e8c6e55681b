//! HTTP error handling with builder pattern for dynamic error responses.

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use biblio_core::{AuthError, AuthErrorKind};
use validator::ValidationErrors;

use crate::handler::response::ErrorResponse;

/// The error type for HTTP handlers in the server.
///
/// Wraps an [`ErrorKind`] with optional custom message, context, and
/// resource information.
#[derive(Clone)]
#[must_use = "errors do nothing unless serialized"]
pub struct Error<'a> {
    kind: ErrorKind,
    context: Option<Cow<'a, str>>,
    message: Option<Cow<'a, str>>,
    resource: Option<Cow<'a, str>>,
}

impl Error<'static> {
    /// Creates a new [`Error`] with the specified kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            message: None,
            resource: None,
        }
    }
}

impl<'a> Error<'a> {
    /// Attaches context information to the error.
    #[inline]
    pub fn with_context(self, context: impl Into<Cow<'a, str>>) -> Self {
        Self {
            context: Some(context.into()),
            ..self
        }
    }

    /// Sets a custom user-facing message for the error.
    #[inline]
    pub fn with_message(self, message: impl Into<Cow<'a, str>>) -> Self {
        Self {
            message: Some(message.into()),
            ..self
        }
    }

    /// Sets the resource that caused the error.
    #[inline]
    pub fn with_resource(self, resource: impl Into<Cow<'a, str>>) -> Self {
        Self {
            resource: Some(resource.into()),
            ..self
        }
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the custom message if present.
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the context if present.
    #[inline]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl Default for Error<'static> {
    #[inline]
    fn default() -> Self {
        Self::new(ErrorKind::default())
    }
}

impl fmt::Debug for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();

        let mut debug_struct = f.debug_struct("Error");
        debug_struct
            .field("kind", &self.kind)
            .field("name", &response.name)
            .field("status", &response.status);

        if let Some(ref message) = self.message {
            debug_struct.field("message", message);
        }
        if let Some(ref context) = self.context {
            debug_struct.field("context", context);
        }
        if let Some(ref resource) = self.resource {
            debug_struct.field("resource", resource);
        }

        debug_struct.finish()
    }
}

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();
        let message = match self.message.as_deref() {
            Some(message) => message,
            None => response.message.as_ref(),
        };

        write!(f, "{} ({}): {}", response.name, response.status, message)?;

        if let Some(ref context) = self.context {
            write!(f, " - {context}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error<'_> {}

impl IntoResponse for Error<'_> {
    fn into_response(self) -> Response {
        let mut response = self.kind.response();

        if let Some(message) = self.message {
            response = response.with_message(message);
        }
        if let Some(resource) = self.resource {
            response = response.with_resource(resource);
        }
        if let Some(context) = self.context {
            response = response.with_context(context);
        }

        response.into_response()
    }
}

impl From<ErrorKind> for Error<'static> {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<AuthError> for Error<'static> {
    fn from(error: AuthError) -> Self {
        let kind = match error.kind() {
            AuthErrorKind::UserExists => ErrorKind::UserExists,
            AuthErrorKind::UserNotFound => ErrorKind::UserNotFound,
            AuthErrorKind::InvalidCode => ErrorKind::InvalidCode,
            AuthErrorKind::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthErrorKind::InvalidInput => ErrorKind::BadRequest,
            AuthErrorKind::TokenExpired => ErrorKind::TokenExpired,
            AuthErrorKind::TokenInvalid => ErrorKind::TokenInvalid,
            AuthErrorKind::CouldNotCreateUser => ErrorKind::CouldNotCreateUser,
            AuthErrorKind::Internal => ErrorKind::InternalServerError,
        };

        // Internal details stay in the log; the response carries the
        // taxonomy message only.
        if kind == ErrorKind::InternalServerError {
            tracing::error!(error = %error, "internal error reached the http boundary");
            kind.into_error()
        } else {
            kind.with_message(error.message().to_owned())
        }
    }
}

impl From<ValidationErrors> for Error<'static> {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> =
            errors.field_errors().keys().map(ToString::to_string).collect();
        fields.sort_unstable();

        ErrorKind::BadRequest
            .with_message("One or more fields failed validation")
            .with_context(format!("invalid fields: {}", fields.join(", ")))
            .into_static()
    }
}

impl Error<'_> {
    /// Converts this error into a static version by cloning borrowed data.
    pub fn into_static(self) -> Error<'static> {
        Error {
            kind: self.kind,
            context: self.context.map(|c| Cow::Owned(c.into_owned())),
            message: self.message.map(|m| Cow::Owned(m.into_owned())),
            resource: self.resource.map(|r| Cow::Owned(r.into_owned())),
        }
    }
}

/// A specialized [`Result`] type for HTTP handler operations.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error<'static>> = std::result::Result<T, E>;

/// Enumeration of all error kinds the handlers produce.
///
/// Each variant corresponds to one [`ErrorResponse`] constant and therefore
/// to one HTTP status code and stable error name.
#[must_use = "error kinds do nothing unless used to create errors"]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // 4xx Client Errors
    /// 400 Bad Request - Invalid request data.
    BadRequest,
    /// 400 Bad Request - Account already exists.
    UserExists,
    /// 400 Bad Request - Wrong or expired verification code.
    InvalidCode,
    /// 400 Bad Request - Identifier/password mismatch.
    InvalidCredentials,
    /// 401 Unauthorized - Missing authentication token.
    MissingAuthToken,
    /// 401 Unauthorized - Malformed authentication token.
    MalformedAuthToken,
    /// 401 Unauthorized - Expired token.
    TokenExpired,
    /// 401 Unauthorized - Unverifiable token.
    TokenInvalid,
    /// 401 Unauthorized - Invalid credentials state.
    Unauthorized,
    /// 403 Forbidden - Access denied.
    Forbidden,
    /// 404 Not Found - Resource not found.
    NotFound,
    /// 404 Not Found - Account not found.
    UserNotFound,

    // 5xx Server Errors
    /// 500 Internal Server Error - Registration could not be persisted.
    CouldNotCreateUser,
    /// 500 Internal Server Error - Unexpected server error.
    #[default]
    InternalServerError,
}

impl ErrorKind {
    /// Converts this error kind into a full [`Error`].
    #[inline]
    pub fn into_error(self) -> Error<'static> {
        Error::new(self)
    }

    /// Creates an [`Error`] with the specified context.
    #[inline]
    pub fn with_context<'a>(self, context: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_context(context)
    }

    /// Creates an [`Error`] with the specified message.
    #[inline]
    pub fn with_message<'a>(self, message: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_message(message)
    }

    /// Returns the HTTP status code for this error kind.
    #[inline]
    pub fn status_code(self) -> StatusCode {
        self.response().status
    }

    /// Returns the response representation of this error kind.
    #[inline]
    pub fn response(self) -> ErrorResponse<'static> {
        match self {
            Self::BadRequest => ErrorResponse::BAD_REQUEST,
            Self::UserExists => ErrorResponse::USER_EXISTS,
            Self::InvalidCode => ErrorResponse::INVALID_CODE,
            Self::InvalidCredentials => ErrorResponse::INVALID_CREDENTIALS,
            Self::MissingAuthToken => ErrorResponse::MISSING_AUTH_TOKEN,
            Self::MalformedAuthToken => ErrorResponse::MALFORMED_AUTH_TOKEN,
            Self::TokenExpired => ErrorResponse::TOKEN_EXPIRED,
            Self::TokenInvalid => ErrorResponse::TOKEN_INVALID,
            Self::Unauthorized => ErrorResponse::UNAUTHORIZED,
            Self::Forbidden => ErrorResponse::FORBIDDEN,
            Self::NotFound => ErrorResponse::NOT_FOUND,
            Self::UserNotFound => ErrorResponse::USER_NOT_FOUND,
            Self::CouldNotCreateUser => ErrorResponse::COULD_NOT_CREATE_USER,
            Self::InternalServerError => ErrorResponse::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.response().name.as_ref())
    }
}

impl IntoResponse for ErrorKind {
    #[inline]
    fn into_response(self) -> Response {
        self.response().into_response()
    }
}
