//! One-time code delivery over email.
//!
//! The auth service treats delivery as a fire-and-forget side effect: a
//! failed send never rolls back the state that issued the code, since the
//! user can always request a resend. [`SmtpDispatcher`] delivers over SMTP;
//! [`RecordingDispatcher`] captures codes in memory for tests and local runs.

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::TRACING_TARGET_DISPATCH;
use crate::error::{AuthError, AuthResult};

/// What an issued code authorizes, used to pick the message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodePurpose {
    /// Activating a freshly registered account.
    Registration,
    /// Resetting a forgotten password.
    PasswordReset,
    /// Confirming a pending email change.
    EmailChange,
}

impl CodePurpose {
    /// Returns the subject line for this purpose.
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::Registration => "Confirm your Biblio account",
            Self::PasswordReset => "Reset your Biblio password",
            Self::EmailChange => "Confirm your new email address",
        }
    }

    fn body_text(self, code: &str) -> String {
        let action = match self {
            Self::Registration => "finish setting up your account",
            Self::PasswordReset => "reset your password",
            Self::EmailChange => "confirm your new email address",
        };
        format!(
            "Use the code {code} to {action}. \
             The code expires in 30 minutes. If you did not request it, you can ignore this message."
        )
    }

    fn body_html(self, code: &str) -> String {
        let action = match self {
            Self::Registration => "finish setting up your account",
            Self::PasswordReset => "reset your password",
            Self::EmailChange => "confirm your new email address",
        };
        format!(
            "<p>Use the code <strong>{code}</strong> to {action}.</p>\
             <p>The code expires in 30 minutes. If you did not request it, you can ignore this message.</p>"
        )
    }
}

/// Delivers one-time codes to an email address.
#[async_trait]
pub trait CodeDispatcher: Send + Sync + 'static {
    /// Sends `code` to `recipient` for the given purpose.
    async fn send_code(&self, recipient: &str, purpose: CodePurpose, code: &str)
    -> AuthResult<()>;
}

/// SMTP connection settings for [`SmtpDispatcher`].
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP relay hostname.
    pub host: String,
    /// SMTP relay port.
    pub port: u16,
    /// SMTP username; empty disables authentication.
    pub username: String,
    /// SMTP password; empty disables authentication.
    pub password: String,
    /// Sender email address.
    pub from_address: String,
    /// Sender display name.
    pub from_name: String,
}

/// SMTP-backed implementation of [`CodeDispatcher`].
pub struct SmtpDispatcher {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpDispatcher {
    /// Creates a dispatcher from SMTP settings.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the relay cannot be configured, when
    /// credentials are half-provided, or when the sender address is invalid.
    pub fn new(config: &SmtpConfig) -> AuthResult<Self> {
        let has_username = !config.username.is_empty();
        let has_password = !config.password.is_empty();
        if has_username != has_password {
            return Err(AuthError::internal(
                "SMTP username and password must both be provided or both be empty",
            ));
        }

        let builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| {
                AuthError::internal("failed to configure SMTP transport").with_source(e)
            })?
            .port(config.port);

        let transport = if has_username {
            builder
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build()
        } else {
            builder.build()
        };

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                AuthError::internal("invalid sender address").with_source(e)
            })?;

        Ok(Self { from, transport })
    }
}

#[async_trait]
impl CodeDispatcher for SmtpDispatcher {
    async fn send_code(
        &self,
        recipient: &str,
        purpose: CodePurpose,
        code: &str,
    ) -> AuthResult<()> {
        let to: Mailbox = recipient.parse().map_err(|e: lettre::address::AddressError| {
            AuthError::invalid_input("invalid recipient email address").with_source(e)
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(purpose.subject())
            .multipart(MultiPart::alternative_plain_html(
                purpose.body_text(code),
                purpose.body_html(code),
            ))
            .map_err(|e| AuthError::internal("failed to build email message").with_source(e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AuthError::internal("failed to send email").with_source(e))?;

        tracing::info!(
            target: TRACING_TARGET_DISPATCH,
            recipient = %recipient,
            subject = purpose.subject(),
            "verification code dispatched"
        );
        Ok(())
    }
}

/// A dispatched code captured by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    /// Recipient email address.
    pub recipient: String,
    /// What the code authorizes.
    pub purpose: CodePurpose,
    /// The plaintext code.
    pub code: String,
}

/// Recording implementation of [`CodeDispatcher`].
///
/// Logs each send and keeps the plaintext codes so tests (and local
/// development) can complete verification flows without a mail relay.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentCode>>,
    fail_sends: bool,
}

impl RecordingDispatcher {
    /// Creates a dispatcher that records every send.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher whose sends always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: true,
        }
    }

    /// Returns every code sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Returns the most recent code sent to `recipient`, if any.
    #[must_use]
    pub fn last_code_for(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .rev()
            .find(|s| s.recipient.eq_ignore_ascii_case(recipient))
            .map(|s| s.code.clone())
    }
}

#[async_trait]
impl CodeDispatcher for RecordingDispatcher {
    async fn send_code(
        &self,
        recipient: &str,
        purpose: CodePurpose,
        code: &str,
    ) -> AuthResult<()> {
        if self.fail_sends {
            tracing::warn!(
                target: TRACING_TARGET_DISPATCH,
                recipient = %recipient,
                "recording dispatcher simulating a delivery failure"
            );
            return Err(AuthError::internal("simulated delivery failure"));
        }

        tracing::info!(
            target: TRACING_TARGET_DISPATCH,
            recipient = %recipient,
            subject = purpose.subject(),
            "verification code recorded (not sent)"
        );
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(SentCode {
                recipient: recipient.to_string(),
                purpose,
                code: code.to_string(),
            });
        Ok(())
    }
}
