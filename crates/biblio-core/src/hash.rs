//! Credential hashing and verification using Argon2id.
//!
//! One hasher covers every secret the platform stores: passwords, one-time
//! verification codes, and refresh tokens. Only the PHC-format hash is ever
//! persisted; verification is timing-safe and a dummy-verification path keeps
//! response timing uniform when no account matches.

use argon2::password_hash::Error as ArgonError;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
};

use crate::TRACING_TARGET_HASH;
use crate::error::{AuthError, AuthResult};

/// One-way hashing service for passwords, codes, and refresh tokens.
///
/// Uses the Argon2id variant with OWASP recommended parameters
/// (19 MiB memory, 2 iterations, 1 lane) and a unique random salt per hash.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Creates a new hasher with OWASP recommended configuration.
    ///
    /// # Errors
    ///
    /// Returns an internal error if Argon2 rejects the parameters.
    pub fn new() -> AuthResult<Self> {
        let params = Params::new(
            19456, // 19 MiB memory cost
            2,     // iterations
            1,     // lanes
            None,  // default output length (32 bytes)
        )
        .map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_HASH,
                error = %e,
                "failed to create Argon2 parameters"
            );
            AuthError::internal("invalid credential hashing configuration")
        })?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    /// Hashes a plaintext secret with a fresh random salt.
    ///
    /// The returned PHC string embeds the algorithm, parameters, salt, and
    /// digest, and can be stored directly.
    ///
    /// # Errors
    ///
    /// Returns an internal error if salt generation or hashing fails. The
    /// plaintext is never logged.
    pub fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes())
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_HASH,
                    error = %e,
                    "hashing operation failed"
                );
                AuthError::internal("credential processing failed")
            })?;

        Ok(hash.to_string())
    }

    /// Verifies a plaintext secret against a stored PHC hash.
    ///
    /// Returns `false` for a mismatch, an empty stored hash, or an
    /// unparseable hash. Malformed hashes are logged at warn level since they
    /// indicate corrupted storage rather than a bad credential.
    #[must_use]
    pub fn verify(&self, stored_hash: &str, plaintext: &str) -> bool {
        if stored_hash.is_empty() {
            return false;
        }

        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    target: TRACING_TARGET_HASH,
                    error = %e,
                    "stored credential hash has invalid format"
                );
                return false;
            }
        };

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(ArgonError::PasswordInvalid) => false,
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_HASH,
                    error = %e,
                    "credential verification system error"
                );
                false
            }
        }
    }

    /// Performs a dummy verification to keep timing uniform.
    ///
    /// Called when no account matches the presented identifier, so that a
    /// missing account takes as long as a wrong password and cannot be
    /// distinguished by timing analysis. Always returns `false`.
    #[must_use]
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        use rand::RngExt;

        let dummy_len = rand::random_range(16..32);
        let dummy: String = (0..dummy_len)
            .map(|_| rand::rng().sample(rand::distr::Alphanumeric) as char)
            .collect();

        if let Ok(dummy_hash) = self.hash(&dummy) {
            let _ = self.verify(&dummy_hash, plaintext);
        }

        false
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new().expect("failed to create default CredentialHasher")
    }
}
