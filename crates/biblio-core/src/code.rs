//! One-time verification codes and session identifiers.

use rand::RngExt;
use time::Duration;
use uuid::Uuid;

/// Number of digits in a one-time code.
const CODE_LENGTH: usize = 6;

/// How long an issued code stays valid.
const CODE_TTL: Duration = Duration::minutes(30);

/// Generates one-time codes and session identifiers.
///
/// Codes are fixed-length numeric strings drawn from the thread-local CSPRNG;
/// only their Argon2 hash is ever persisted. Session identifiers correlate
/// access/refresh token pairs across rotations and carry no entropy
/// requirements beyond uniqueness.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    length: usize,
    ttl: Duration,
}

impl CodeGenerator {
    /// Creates a generator with the default length and lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            length: CODE_LENGTH,
            ttl: CODE_TTL,
        }
    }

    /// Creates a generator with a custom code lifetime.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            length: CODE_LENGTH,
            ttl,
        }
    }

    /// Returns the configured code lifetime.
    #[inline]
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generates a fresh numeric one-time code.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }

    /// Generates a fresh session identifier.
    #[must_use]
    pub fn new_session_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_fixed_length_digits() {
        let generator = CodeGenerator::new();
        for _ in 0..64 {
            let code = generator.generate();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_vary() {
        let generator = CodeGenerator::new();
        let codes: std::collections::HashSet<_> =
            (0..32).map(|_| generator.generate()).collect();
        // 32 draws from a million-value space colliding down to one value
        // would mean a broken generator.
        assert!(codes.len() > 1);
    }

    #[test]
    fn session_ids_are_unique() {
        let generator = CodeGenerator::new();
        assert_ne!(generator.new_session_id(), generator.new_session_id());
    }

    #[test]
    fn custom_ttl_is_respected() {
        let generator = CodeGenerator::with_ttl(Duration::minutes(5));
        assert_eq!(generator.ttl(), Duration::minutes(5));
    }
}
