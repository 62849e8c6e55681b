//! Application state and dependency injection.

mod config;
mod cookie;
mod state;
mod strength;

pub use self::config::{ServiceConfig, ServiceConfigBuilder};
pub use self::cookie::RefreshCookie;
pub use self::state::ServiceState;
pub use self::strength::PasswordStrength;
