//! Password strength validation.

use zxcvbn::{Score, zxcvbn};

use crate::handler::{ErrorKind, Result};

/// Password strength checker backed by `zxcvbn`.
///
/// Runs at the HTTP boundary (signup and password changes); the core service
/// deliberately accepts any password the boundary lets through.
#[derive(Debug, Clone, Copy)]
pub struct PasswordStrength {
    minimum: Score,
}

impl Default for PasswordStrength {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordStrength {
    /// Minimum acceptable score: "safely unguessable" per zxcvbn.
    const MINIMUM_SCORE: Score = Score::Three;

    /// Creates a checker with the default threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            minimum: Self::MINIMUM_SCORE,
        }
    }

    /// Validates a password against the threshold.
    ///
    /// `user_inputs` (email parts, names) score as guessable context rather
    /// than entropy, so "ada.lovelace1815" fails for Ada.
    ///
    /// # Errors
    ///
    /// Returns a 400 error when the password scores below the threshold.
    pub fn validate(&self, password: &str, user_inputs: &[&str]) -> Result<()> {
        let entropy = zxcvbn(password, user_inputs);
        if entropy.score() < self.minimum {
            return Err(ErrorKind::BadRequest
                .with_message("Password is too weak")
                .with_context("Use a longer password that avoids names, emails, and common words")
                .into_static());
        }
        Ok(())
    }
}
