//! Application state and dependency injection.

use std::sync::Arc;

use biblio_core::{AuthService, CodeDispatcher, TokenIssuer, UserStore};

use crate::handler::Result;
use crate::service::{PasswordStrength, RefreshCookie, ServiceConfig};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    auth_service: AuthService,
    token_issuer: TokenIssuer,
    password_strength: PasswordStrength,
    refresh_cookie: RefreshCookie,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Connects to Postgres (running pending migrations) and wires the SMTP
    /// dispatcher when configured.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let store = config.create_user_store().await?;
        let dispatcher = config.create_dispatcher()?;
        Self::with_collaborators(config, store, dispatcher)
    }

    /// Initializes application state over explicit collaborators.
    ///
    /// This is the seam the tests use: an in-memory store and a recording
    /// dispatcher give the full HTTP surface without external services.
    pub fn with_collaborators(
        config: &ServiceConfig,
        store: Arc<dyn UserStore>,
        dispatcher: Arc<dyn CodeDispatcher>,
    ) -> Result<Self> {
        let auth_service = config.create_auth_service(store, dispatcher)?;
        let token_issuer = auth_service.token_issuer().clone();

        Ok(Self {
            auth_service,
            token_issuer,
            password_strength: PasswordStrength::new(),
            refresh_cookie: config.refresh_cookie(),
        })
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+ $(,)?) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(auth_service: AuthService);
impl_di!(token_issuer: TokenIssuer);
impl_di!(password_strength: PasswordStrength);
impl_di!(refresh_cookie: RefreshCookie);
