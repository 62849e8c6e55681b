//! Authentication handlers: signup, activation, login, logout, token
//! rotation, and password reset.
//!
//! Refresh tokens travel either in the request/response body or in an
//! HTTP-only cookie; each token-bearing request flags which transport it
//! uses and the same core operations serve both.

use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use biblio_core::{AuthService, AuthToken, LoginOutcome, PublicUser, RegisterUser};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use uuid::Uuid;
use validator::Validate;

use crate::extract::{AuthState, Json, ValidateJson};
use crate::handler::response::MessageResponse;
use crate::handler::{ErrorKind, ErrorResponse, Result};
use crate::service::{PasswordStrength, RefreshCookie, ServiceState};

/// Tracing target for authentication handlers.
const TRACING_TARGET: &str = "biblio_server::handler::authentication";

/// Request payload for signup.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    /// Email address of the new account.
    #[validate(email)]
    pub email: String,
    /// Password of the new account.
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    /// Given name.
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    /// Family name.
    #[validate(length(min = 1, max = 64))]
    pub last_name: String,
    /// Optional phone number (alternate login identifier).
    pub phone: Option<String>,
}

/// Registers an account and emails a verification code.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post, path = "/auth/signup/", tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = CREATED, description = "Registration stored, verification code sent", body = MessageResponse),
        (status = BAD_REQUEST, description = "Invalid input, weak password, or account exists", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Registration could not be persisted", body = ErrorResponse),
    ),
)]
async fn signup(
    State(auth_service): State<AuthService>,
    State(password_strength): State<PasswordStrength>,
    ValidateJson(request): ValidateJson<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    tracing::trace!(
        target: TRACING_TARGET,
        email = %request.email,
        "signup attempt"
    );

    let email_parts: Vec<&str> = request.email.split('@').collect();
    let mut user_inputs = vec![request.first_name.as_str(), request.last_name.as_str()];
    user_inputs.extend(email_parts);
    password_strength.validate(&request.password, &user_inputs)?;

    let message = auth_service
        .register(RegisterUser {
            email: request.email,
            password: request.password,
            phone: request.phone,
            first_name: request.first_name,
            last_name: request.last_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new(message))))
}

/// Request payload for account activation.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ActivateRequest {
    /// Email or phone number the account was registered with.
    #[validate(length(min = 3, max = 128))]
    pub identifier: String,
    /// One-time code from the verification email.
    #[validate(length(min = 4, max = 8))]
    pub code: String,
}

/// Sanitized account payload.
#[must_use]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserResponse {
    /// Account identifier.
    pub id: Uuid,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Access level.
    pub role: String,
    /// Whether the account is activated.
    pub active: bool,
}

impl From<PublicUser> for UserResponse {
    fn from(user: PublicUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            phone: user.phone,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role.to_string(),
            active: user.active,
        }
    }
}

/// Activates an account with the emailed code.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post, path = "/auth/activate/", tag = "auth",
    request_body = ActivateRequest,
    responses(
        (status = OK, description = "Account activated", body = UserResponse),
        (status = BAD_REQUEST, description = "Wrong or expired code, or already active", body = ErrorResponse),
    ),
)]
async fn activate(
    State(auth_service): State<AuthService>,
    ValidateJson(request): ValidateJson<ActivateRequest>,
) -> Result<Json<UserResponse>> {
    let user = auth_service
        .activate(&request.identifier, &request.code)
        .await?;

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %user.id,
        "account activated"
    );
    Ok(Json(user.into()))
}

/// Request payload for login.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    /// Email or phone number of the account.
    #[validate(length(min = 3, max = 128))]
    pub identifier: String,
    /// Password of the account.
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Issued token pair.
#[must_use]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenPair {
    /// Short-lived token for the Authorization header.
    pub access_token: String,
    /// Longer-lived token redeemable for a new pair.
    pub refresh_token: String,
    /// Stable session correlation id.
    pub session_id: String,
    /// Expiry of the access token, RFC 3339.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: time::OffsetDateTime,
}

impl From<AuthToken> for TokenPair {
    fn from(token: AuthToken) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            session_id: token.session_id,
            expires_at: token.expires_at,
        }
    }
}

/// Response for login and token rotation.
#[must_use]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    /// The issued token pair.
    pub auth_token: TokenPair,
    /// Sanitized account data.
    pub user_data: UserResponse,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            auth_token: outcome.auth_token.into(),
            user_data: outcome.user_data.into(),
        }
    }
}

/// Authenticates an account and establishes a session.
///
/// The refresh token is returned both in the body and as an HTTP-only
/// cookie; clients pick one transport and stick to it.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post, path = "/auth/login/", tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = OK, description = "Session established, refresh cookie set", body = LoginResponse),
        (status = BAD_REQUEST, description = "Unknown identifier, inactive account, or wrong password", body = ErrorResponse),
    ),
)]
async fn login(
    State(auth_service): State<AuthService>,
    State(refresh_cookie): State<RefreshCookie>,
    jar: CookieJar,
    ValidateJson(request): ValidateJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    tracing::trace!(
        target: TRACING_TARGET,
        identifier = %request.identifier,
        "login attempt"
    );

    let outcome = auth_service
        .login(&request.identifier, &request.password)
        .await?;

    let jar = jar.add(refresh_cookie.bearing(&outcome.auth_token.refresh_token));
    Ok((jar, Json(outcome.into())))
}

/// Request payload carrying a refresh token by body or by cookie.
#[must_use]
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    /// Refresh token, when sent in the body.
    pub refresh_token: Option<String>,
    /// When true, the token is read from the HTTP-only cookie instead.
    #[serde(default)]
    pub is_cookie: bool,
}

/// Picks the refresh token from the flagged transport.
fn resolve_refresh_token(
    request: &TokenRequest,
    jar: &CookieJar,
    refresh_cookie: &RefreshCookie,
) -> Result<String> {
    let token = if request.is_cookie {
        jar.get(refresh_cookie.name())
            .map(|cookie| cookie.value().to_owned())
    } else {
        request.refresh_token.clone()
    };

    // Clients have been seen serializing a literal "undefined" into the
    // body; treat it like an absent token.
    token
        .filter(|token| !token.is_empty() && token != "undefined")
        .ok_or_else(|| {
            ErrorKind::BadRequest
                .with_message("No refresh token found")
                .into_static()
        })
}

/// Rotates the refresh token, preserving the session identity.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post, path = "/auth/refresh/", tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = OK, description = "New token pair issued, refresh cookie reset", body = LoginResponse),
        (status = BAD_REQUEST, description = "No refresh token provided", body = ErrorResponse),
        (status = UNAUTHORIZED, description = "Expired, invalid, or superseded refresh token", body = ErrorResponse),
    ),
)]
async fn reset_tokens(
    State(auth_service): State<AuthService>,
    State(refresh_cookie): State<RefreshCookie>,
    jar: CookieJar,
    ValidateJson(request): ValidateJson<TokenRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let token = resolve_refresh_token(&request, &jar, &refresh_cookie)?;
    let outcome = auth_service.reset_tokens(&token).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        session_id = %outcome.auth_token.session_id,
        "tokens rotated"
    );

    let jar = jar.add(refresh_cookie.bearing(&outcome.auth_token.refresh_token));
    Ok((jar, Json(outcome.into())))
}

/// Ends the session bound to the presented refresh token.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post, path = "/auth/logout/", tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = OK, description = "Session cleared, refresh cookie removed", body = bool),
        (status = BAD_REQUEST, description = "No refresh token provided", body = ErrorResponse),
        (status = UNAUTHORIZED, description = "Expired or invalid refresh token", body = ErrorResponse),
    ),
)]
async fn logout(
    State(auth_service): State<AuthService>,
    State(refresh_cookie): State<RefreshCookie>,
    jar: CookieJar,
    ValidateJson(request): ValidateJson<TokenRequest>,
) -> Result<(CookieJar, Json<bool>)> {
    let token = resolve_refresh_token(&request, &jar, &refresh_cookie)?;
    let logged_out = auth_service.log_out(&token).await?;

    let jar = jar.add(refresh_cookie.cleared());
    Ok((jar, Json(logged_out)))
}

/// Request payload for requesting a password-reset code.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ForgotPasswordRequest {
    /// Email address of the account.
    #[validate(email)]
    pub email: String,
}

/// Emails a password-reset code to an active account.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post, path = "/auth/forgot-password/", tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = OK, description = "Reset code sent", body = bool),
        (status = NOT_FOUND, description = "No active account with this email", body = ErrorResponse),
    ),
)]
async fn forgot_password(
    State(auth_service): State<AuthService>,
    ValidateJson(request): ValidateJson<ForgotPasswordRequest>,
) -> Result<Json<bool>> {
    auth_service.send_reset_code(&request.email).await?;
    Ok(Json(true))
}

/// Request payload for resetting a password with a code.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    /// Email address of the account.
    #[validate(email)]
    pub email: String,
    /// One-time code from the reset email.
    #[validate(length(min = 4, max = 8))]
    pub code: String,
    /// Replacement password.
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Resets a password with the emailed code.
///
/// Also revokes the active session on every device.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post, path = "/auth/reset-password/", tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = OK, description = "Password replaced, sessions revoked", body = bool),
        (status = BAD_REQUEST, description = "Wrong or expired code, or weak password", body = ErrorResponse),
    ),
)]
async fn reset_password(
    State(auth_service): State<AuthService>,
    State(password_strength): State<PasswordStrength>,
    ValidateJson(request): ValidateJson<ResetPasswordRequest>,
) -> Result<Json<bool>> {
    let email_parts: Vec<&str> = request.email.split('@').collect();
    password_strength.validate(&request.new_password, &email_parts)?;

    let reset = auth_service
        .reset_password(&request.email, &request.code, &request.new_password)
        .await?;
    Ok(Json(reset))
}

/// Request payload for changing a password while signed in.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    /// Current password.
    #[validate(length(min = 1, max = 128))]
    pub old_password: String,
    /// Replacement password.
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Changes the password of the authenticated account.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    patch, path = "/auth/change-password/", tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = OK, description = "Password changed", body = MessageResponse),
        (status = BAD_REQUEST, description = "Wrong old password or weak new password", body = ErrorResponse),
        (status = NOT_FOUND, description = "Account is gone or inactive", body = ErrorResponse),
    ),
)]
async fn change_password(
    State(auth_service): State<AuthService>,
    State(password_strength): State<PasswordStrength>,
    AuthState(user): AuthState,
    ValidateJson(request): ValidateJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    password_strength.validate(&request.new_password, &[])?;

    let message = auth_service
        .change_password(user.id, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(MessageResponse::new(message)))
}

/// Returns an [`OpenApiRouter`] with the public authentication routes.
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new()
        .routes(routes!(signup))
        .routes(routes!(activate))
        .routes(routes!(login))
        .routes(routes!(logout))
        .routes(routes!(reset_tokens))
        .routes(routes!(forgot_password))
        .routes(routes!(reset_password))
}

/// Returns an [`OpenApiRouter`] with authentication routes that require a
/// signed-in account.
pub fn protected_routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new().routes(routes!(change_password))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handler::test::{STRONG_PASSWORD, TestApp, signup_and_activate};

    #[tokio::test]
    async fn signup_success() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;

        let response = app
            .server
            .post("/auth/signup/")
            .json(&serde_json::json!({
                "email": "test@example.com",
                "password": STRONG_PASSWORD,
                "firstName": "Test",
                "lastName": "User",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: MessageResponse = response.json();
        assert!(!body.message.is_empty());
        // The code is dispatched out of band, never in the response.
        let code = app.dispatcher.last_code_for("test@example.com");
        assert!(code.is_some());
        assert!(!body.message.contains(code.unwrap().as_str()));

        Ok(())
    }

    #[tokio::test]
    async fn signup_invalid_email() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;

        let response = app
            .server
            .post("/auth/signup/")
            .json(&serde_json::json!({
                "email": "invalid-email",
                "password": STRONG_PASSWORD,
                "firstName": "Test",
                "lastName": "User",
            }))
            .await;
        response.assert_status_bad_request();

        Ok(())
    }

    #[tokio::test]
    async fn signup_weak_password() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;

        let response = app
            .server
            .post("/auth/signup/")
            .json(&serde_json::json!({
                "email": "weak@example.com",
                "password": "password123",
                "firstName": "Test",
                "lastName": "User",
            }))
            .await;
        response.assert_status_bad_request();

        Ok(())
    }

    #[tokio::test]
    async fn signup_duplicate_active_email() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        signup_and_activate(&app, "dup@example.com").await?;

        let response = app
            .server
            .post("/auth/signup/")
            .json(&serde_json::json!({
                "email": "dup@example.com",
                "password": STRONG_PASSWORD,
                "firstName": "Test",
                "lastName": "User",
            }))
            .await;
        response.assert_status_bad_request();

        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "user_exists");

        Ok(())
    }

    #[tokio::test]
    async fn activate_then_login() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        app.signup("flow@example.com").await;

        let code = app
            .dispatcher
            .last_code_for("flow@example.com")
            .expect("code dispatched");
        let response = app
            .server
            .post("/auth/activate/")
            .json(&serde_json::json!({
                "identifier": "flow@example.com",
                "code": code,
            }))
            .await;
        response.assert_status_ok();

        let body: UserResponse = response.json();
        assert!(body.active);
        assert_eq!(body.email.as_deref(), Some("flow@example.com"));

        let response = app
            .server
            .post("/auth/login/")
            .json(&serde_json::json!({
                "identifier": "flow@example.com",
                "password": STRONG_PASSWORD,
            }))
            .await;
        response.assert_status_ok();

        let body: LoginResponse = response.json();
        assert!(!body.auth_token.access_token.is_empty());
        assert!(!body.auth_token.refresh_token.is_empty());

        // Refresh cookie is set alongside the body transport.
        assert!(response.maybe_cookie("refresh_token").is_some());

        Ok(())
    }

    #[tokio::test]
    async fn login_response_carries_no_credential_fields() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "clean@example.com").await?;

        let user_data = serde_json::to_string(&login.user_data)?;
        assert!(!user_data.contains("password"));
        assert!(!user_data.contains("Hash"));
        assert!(!user_data.contains("hashedRefreshToken"));
        assert!(!user_data.contains("verificationCode"));

        Ok(())
    }

    #[tokio::test]
    async fn login_before_activation_fails() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        app.signup("pending@example.com").await;

        let response = app
            .server
            .post("/auth/login/")
            .json(&serde_json::json!({
                "identifier": "pending@example.com",
                "password": STRONG_PASSWORD,
            }))
            .await;
        response.assert_status_bad_request();

        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "invalid_credentials");

        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_indistinguishable() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        signup_and_activate(&app, "enum@example.com").await?;

        let wrong_password = app
            .server
            .post("/auth/login/")
            .json(&serde_json::json!({
                "identifier": "enum@example.com",
                "password": "Wrong-Password-42!",
            }))
            .await;
        let unknown_user = app
            .server
            .post("/auth/login/")
            .json(&serde_json::json!({
                "identifier": "ghost@example.com",
                "password": "Wrong-Password-42!",
            }))
            .await;

        wrong_password.assert_status_bad_request();
        unknown_user.assert_status_bad_request();

        let wrong: serde_json::Value = wrong_password.json();
        let unknown: serde_json::Value = unknown_user.json();
        assert_eq!(wrong["name"], unknown["name"]);
        assert_eq!(wrong["message"], unknown["message"]);

        Ok(())
    }

    #[tokio::test]
    async fn refresh_rotates_and_invalidates_old_token() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "rotate@example.com").await?;

        let response = app
            .server
            .post("/auth/refresh/")
            .json(&serde_json::json!({
                "refreshToken": login.auth_token.refresh_token,
            }))
            .await;
        response.assert_status_ok();

        let rotated: LoginResponse = response.json();
        assert_eq!(rotated.auth_token.session_id, login.auth_token.session_id);
        assert_ne!(
            rotated.auth_token.refresh_token,
            login.auth_token.refresh_token
        );

        // The superseded token is refused on the next attempt.
        let response = app
            .server
            .post("/auth/refresh/")
            .json(&serde_json::json!({
                "refreshToken": login.auth_token.refresh_token,
            }))
            .await;
        response.assert_status_unauthorized();

        Ok(())
    }

    #[tokio::test]
    async fn refresh_via_cookie_transport() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        signup_and_activate(&app, "cookie@example.com").await?;

        // The login response left the refresh cookie in the test client's
        // jar; flagging cookie mode must pick it up with an empty body.
        let response = app
            .server
            .post("/auth/refresh/")
            .json(&serde_json::json!({ "isCookie": true }))
            .await;
        response.assert_status_ok();

        let rotated: LoginResponse = response.json();
        assert!(!rotated.auth_token.refresh_token.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn refresh_without_token_fails() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;

        let response = app
            .server
            .post("/auth/refresh/")
            .json(&serde_json::json!({}))
            .await;
        response.assert_status_bad_request();

        // The original clients sometimes send the literal string.
        let response = app
            .server
            .post("/auth/refresh/")
            .json(&serde_json::json!({ "refreshToken": "undefined" }))
            .await;
        response.assert_status_bad_request();

        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_the_session_and_cookie() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "logout@example.com").await?;

        let response = app
            .server
            .post("/auth/logout/")
            .json(&serde_json::json!({
                "refreshToken": login.auth_token.refresh_token,
            }))
            .await;
        response.assert_status_ok();
        let cleared = response.cookie("refresh_token");
        assert_eq!(cleared.value(), "");

        // The cleared session refuses further rotations.
        let response = app
            .server
            .post("/auth/refresh/")
            .json(&serde_json::json!({
                "refreshToken": login.auth_token.refresh_token,
            }))
            .await;
        response.assert_status_unauthorized();

        Ok(())
    }

    #[tokio::test]
    async fn forgot_password_requires_known_active_email() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;

        let response = app
            .server
            .post("/auth/forgot-password/")
            .json(&serde_json::json!({ "email": "nobody@example.com" }))
            .await;
        response.assert_status_not_found();

        Ok(())
    }

    #[tokio::test]
    async fn password_reset_flow_revokes_the_session() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "reset@example.com").await?;

        let response = app
            .server
            .post("/auth/forgot-password/")
            .json(&serde_json::json!({ "email": "reset@example.com" }))
            .await;
        response.assert_status_ok();

        let code = app
            .dispatcher
            .last_code_for("reset@example.com")
            .expect("reset code dispatched");
        let response = app
            .server
            .post("/auth/reset-password/")
            .json(&serde_json::json!({
                "email": "reset@example.com",
                "code": code,
                "newPassword": "Fresh-Quasar-Lime-77?",
            }))
            .await;
        response.assert_status_ok();

        // Prior refresh token is gone with the session.
        let response = app
            .server
            .post("/auth/refresh/")
            .json(&serde_json::json!({
                "refreshToken": login.auth_token.refresh_token,
            }))
            .await;
        response.assert_status_unauthorized();

        // New password logs in, old one does not.
        let response = app
            .server
            .post("/auth/login/")
            .json(&serde_json::json!({
                "identifier": "reset@example.com",
                "password": "Fresh-Quasar-Lime-77?",
            }))
            .await;
        response.assert_status_ok();

        Ok(())
    }

    #[tokio::test]
    async fn reset_password_with_wrong_code_fails() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        signup_and_activate(&app, "wrongcode@example.com").await?;

        app.server
            .post("/auth/forgot-password/")
            .json(&serde_json::json!({ "email": "wrongcode@example.com" }))
            .await
            .assert_status_ok();

        let code = app
            .dispatcher
            .last_code_for("wrongcode@example.com")
            .expect("code");
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let response = app
            .server
            .post("/auth/reset-password/")
            .json(&serde_json::json!({
                "email": "wrongcode@example.com",
                "code": wrong,
                "newPassword": "Fresh-Quasar-Lime-77?",
            }))
            .await;
        response.assert_status_bad_request();

        Ok(())
    }

    #[tokio::test]
    async fn change_password_requires_authentication() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;

        let response = app
            .server
            .patch("/auth/change-password/")
            .json(&serde_json::json!({
                "oldPassword": STRONG_PASSWORD,
                "newPassword": "Fresh-Quasar-Lime-77?",
            }))
            .await;
        response.assert_status_unauthorized();

        Ok(())
    }

    #[tokio::test]
    async fn change_password_with_bearer_token() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "change@example.com").await?;

        let response = app
            .server
            .patch("/auth/change-password/")
            .authorization_bearer(&login.auth_token.access_token)
            .json(&serde_json::json!({
                "oldPassword": STRONG_PASSWORD,
                "newPassword": "Fresh-Quasar-Lime-77?",
            }))
            .await;
        response.assert_status_ok();

        let response = app
            .server
            .post("/auth/login/")
            .json(&serde_json::json!({
                "identifier": "change@example.com",
                "password": "Fresh-Quasar-Lime-77?",
            }))
            .await;
        response.assert_status_ok();

        Ok(())
    }
}
