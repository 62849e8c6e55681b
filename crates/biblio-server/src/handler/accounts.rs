//! Account handlers for the signed-in user: profile read and the
//! two-step email change.

use axum::extract::State;
use biblio_core::{AuthService, PublicUser};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use validator::Validate;

use crate::extract::{AuthState, Json, ValidateJson};
use crate::handler::authentication::UserResponse;
use crate::handler::response::MessageResponse;
use crate::handler::{ErrorResponse, Result};
use crate::service::ServiceState;

/// Tracing target for account handlers.
const TRACING_TARGET: &str = "biblio_server::handler::accounts";

/// Returns the authenticated account.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get, path = "/account/", tag = "accounts",
    responses(
        (status = OK, description = "The authenticated account", body = UserResponse),
        (status = UNAUTHORIZED, description = "Missing or invalid access token", body = ErrorResponse),
    ),
)]
async fn get_account(AuthState(user): AuthState) -> Result<Json<UserResponse>> {
    Ok(Json(PublicUser::from(user).into()))
}

/// Request payload for staging an email change.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateEmailRequest {
    /// The address to move the account to.
    #[validate(email)]
    pub new_email: String,
}

/// Stages an email change and sends a code to the new address.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    patch, path = "/account/email/", tag = "accounts",
    request_body = UpdateEmailRequest,
    responses(
        (status = OK, description = "Verification code sent to the new address", body = MessageResponse),
        (status = BAD_REQUEST, description = "Address unchanged or already taken", body = ErrorResponse),
    ),
)]
async fn request_email_change(
    State(auth_service): State<AuthService>,
    AuthState(user): AuthState,
    ValidateJson(request): ValidateJson<UpdateEmailRequest>,
) -> Result<Json<MessageResponse>> {
    tracing::trace!(
        target: TRACING_TARGET,
        user_id = %user.id,
        "email change requested"
    );

    let message = auth_service
        .request_email_change(user.id, &request.new_email)
        .await?;
    Ok(Json(MessageResponse::new(message)))
}

/// Request payload for confirming an email change.
#[must_use]
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
struct VerifyEmailRequest {
    /// One-time code sent to the new address.
    #[validate(length(min = 4, max = 8))]
    pub code: String,
}

/// Confirms a staged email change with the dispatched code.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    patch, path = "/account/email/verify/", tag = "accounts",
    request_body = VerifyEmailRequest,
    responses(
        (status = OK, description = "Email address updated", body = bool),
        (status = BAD_REQUEST, description = "Wrong or expired code, or nothing pending", body = ErrorResponse),
    ),
)]
async fn verify_email_change(
    State(auth_service): State<AuthService>,
    AuthState(user): AuthState,
    ValidateJson(request): ValidateJson<VerifyEmailRequest>,
) -> Result<Json<bool>> {
    let updated = auth_service
        .verify_email_change(user.id, &request.code)
        .await?;
    Ok(Json(updated))
}

/// Returns an [`OpenApiRouter`] with all account routes.
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new()
        .routes(routes!(get_account))
        .routes(routes!(request_email_change))
        .routes(routes!(verify_email_change))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handler::test::{TestApp, signup_and_activate};

    #[tokio::test]
    async fn get_account_requires_token() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;

        let response = app.server.get("/account/").await;
        response.assert_status_unauthorized();

        Ok(())
    }

    #[tokio::test]
    async fn get_account_returns_sanitized_user() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "me@example.com").await?;

        let response = app
            .server
            .get("/account/")
            .authorization_bearer(&login.auth_token.access_token)
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "me@example.com");
        assert!(body.get("passwordHash").is_none());
        assert!(body.get("hashedRefreshToken").is_none());
        assert!(body.get("verificationCodeHash").is_none());

        Ok(())
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "confuse@example.com").await?;

        let response = app
            .server
            .get("/account/")
            .authorization_bearer(&login.auth_token.refresh_token)
            .await;
        response.assert_status_unauthorized();

        Ok(())
    }

    #[tokio::test]
    async fn email_change_flow_over_http() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "old@example.com").await?;
        let access_token = &login.auth_token.access_token;

        let response = app
            .server
            .patch("/account/email/")
            .authorization_bearer(access_token)
            .json(&serde_json::json!({ "newEmail": "new@example.com" }))
            .await;
        response.assert_status_ok();

        let code = app
            .dispatcher
            .last_code_for("new@example.com")
            .expect("code sent to the new address");
        let response = app
            .server
            .patch("/account/email/verify/")
            .authorization_bearer(access_token)
            .json(&serde_json::json!({ "code": code }))
            .await;
        response.assert_status_ok();

        let response = app
            .server
            .get("/account/")
            .authorization_bearer(access_token)
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "new@example.com");

        Ok(())
    }

    #[tokio::test]
    async fn email_change_to_unchanged_address_fails() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let login = signup_and_activate(&app, "same@example.com").await?;

        let response = app
            .server
            .patch("/account/email/")
            .authorization_bearer(&login.auth_token.access_token)
            .json(&serde_json::json!({ "newEmail": "same@example.com" }))
            .await;
        response.assert_status_bad_request();

        Ok(())
    }

    #[tokio::test]
    async fn email_change_to_taken_address_fails() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        signup_and_activate(&app, "owner@example.com").await?;
        let login = signup_and_activate(&app, "mover@example.com").await?;

        let response = app
            .server
            .patch("/account/email/")
            .authorization_bearer(&login.auth_token.access_token)
            .json(&serde_json::json!({ "newEmail": "owner@example.com" }))
            .await;
        response.assert_status_bad_request();

        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "user_exists");

        Ok(())
    }
}
