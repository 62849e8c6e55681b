//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! Public routes cover the full unauthenticated auth lifecycle; private
//! routes sit behind [`require_authentication`] and serve the signed-in
//! account.
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod accounts;
mod authentication;
mod error;
mod response;

use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use utoipa_axum::router::OpenApiRouter;

pub use crate::handler::error::{Error, ErrorKind, Result};
pub(crate) use crate::handler::response::ErrorResponse;
pub use crate::handler::response::MessageResponse;
use crate::middleware::require_authentication;
use crate::service::ServiceState;

#[inline]
async fn fallback() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns an [`OpenApiRouter`] with all routes.
pub fn routes(state: ServiceState) -> OpenApiRouter<ServiceState> {
    let require_authentication = from_fn_with_state(state, require_authentication);

    let private_router = OpenApiRouter::new()
        .merge(authentication::protected_routes())
        .merge(accounts::routes())
        .route_layer(require_authentication);

    let public_router = OpenApiRouter::new().merge(authentication::routes());

    OpenApiRouter::new()
        .merge(private_router)
        .merge(public_router)
        .fallback(fallback)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use biblio_core::{MemoryUserStore, RecordingDispatcher};

    use super::authentication::LoginResponse;
    use super::routes;
    use crate::service::{ServiceConfig, ServiceState};

    /// Password that clears the zxcvbn threshold in every test.
    pub(crate) const STRONG_PASSWORD: &str = "quartz-Lantern-9!-orbit";

    /// A test server over the in-memory store and recording dispatcher.
    pub(crate) struct TestApp {
        pub server: TestServer,
        pub dispatcher: Arc<RecordingDispatcher>,
    }

    impl TestApp {
        /// Builds the full router over fresh in-memory collaborators.
        pub(crate) async fn spawn() -> anyhow::Result<Self> {
            let config = ServiceConfig::default();
            let store = Arc::new(MemoryUserStore::new());
            let dispatcher = Arc::new(RecordingDispatcher::new());
            let state = ServiceState::with_collaborators(&config, store, dispatcher.clone())
                .map_err(|e| anyhow::anyhow!("failed to build state: {e}"))?;

            let (app, _) = routes(state.clone()).with_state(state).split_for_parts();
            let server = TestServer::builder().save_cookies().build(app)?;

            Ok(Self { server, dispatcher })
        }

        /// Registers an account with the standard strong password.
        pub(crate) async fn signup(&self, email: &str) {
            self.server
                .post("/auth/signup/")
                .json(&serde_json::json!({
                    "email": email,
                    "password": STRONG_PASSWORD,
                    "firstName": "Test",
                    "lastName": "User",
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }
    }

    /// Runs the signup, activation, and login flow for `email`.
    pub(crate) async fn signup_and_activate(
        app: &TestApp,
        email: &str,
    ) -> anyhow::Result<LoginResponse> {
        app.signup(email).await;

        let code = app
            .dispatcher
            .last_code_for(email)
            .ok_or_else(|| anyhow::anyhow!("no code dispatched to {email}"))?;
        app.server
            .post("/auth/activate/")
            .json(&serde_json::json!({ "identifier": email, "code": code }))
            .await
            .assert_status_ok();

        let response = app
            .server
            .post("/auth/login/")
            .json(&serde_json::json!({
                "identifier": email,
                "password": STRONG_PASSWORD,
            }))
            .await;
        response.assert_status_ok();

        Ok(response.json())
    }

    #[tokio::test]
    async fn unknown_routes_fall_back_to_not_found() -> anyhow::Result<()> {
        let app = TestApp::spawn().await?;
        let response = app.server.get("/no/such/route/").await;
        response.assert_status_not_found();
        Ok(())
    }
}
