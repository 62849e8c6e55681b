//! Refresh-token cookie settings.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Settings for the HTTP-only refresh-token cookie.
///
/// Refresh tokens travel either in the response/request body or in this
/// cookie; clients flag which transport they use per request.
#[derive(Debug, Clone)]
pub struct RefreshCookie {
    name: String,
    secure: bool,
    max_age: Duration,
}

impl RefreshCookie {
    /// Creates new cookie settings.
    #[must_use]
    pub fn new(name: impl Into<String>, secure: bool, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            secure,
            max_age,
        }
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the Set-Cookie value carrying a refresh token.
    #[must_use]
    pub fn bearing(&self, refresh_token: &str) -> Cookie<'static> {
        Cookie::build((self.name.clone(), refresh_token.to_owned()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(self.max_age)
            .build()
    }

    /// Builds the Set-Cookie value that clears the refresh token.
    #[must_use]
    pub fn cleared(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), String::new()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    }
}

impl Default for RefreshCookie {
    fn default() -> Self {
        Self::new("refresh_token", false, Duration::days(7))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearing_cookie_is_http_only() {
        let cookie = RefreshCookie::default().bearing("token-value");
        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.value(), "token-value");
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = RefreshCookie::default().cleared();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
