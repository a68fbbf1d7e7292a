//! API Key generation
//!
//! Generates high-entropy secrets of the form `<prefix><64 lowercase hex>`.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::domain::DomainError;

/// Default credential family tag
pub const DEFAULT_SECRET_PREFIX: &str = "cfk_";

/// Number of random bytes in a secret (256 bits)
pub const SECRET_RANDOM_BYTES: usize = 32;

/// Length of the non-secret leading fragment kept for display
pub const DISPLAY_PREFIX_LENGTH: usize = 8;

/// Result of generating a new API key
///
/// `secret` exists only transiently and must never be persisted or logged.
#[derive(Clone)]
pub struct GeneratedSecret {
    /// The full plaintext secret (only shown once at creation)
    pub secret: String,
    /// First characters of the secret, kept for display
    pub display_prefix: String,
}

impl std::fmt::Debug for GeneratedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedSecret")
            .field("display_prefix", &self.display_prefix)
            .finish_non_exhaustive()
    }
}

/// Generator for secure API key secrets
#[derive(Debug, Clone)]
pub struct KeyMaterialGenerator {
    /// Fixed ASCII tag identifying the credential family
    prefix: String,
}

impl KeyMaterialGenerator {
    /// Create a generator with a custom family prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Total length of every secret produced by this generator
    pub fn secret_length(&self) -> usize {
        self.prefix.len() + SECRET_RANDOM_BYTES * 2
    }

    /// Generate a new secret from the operating system's secure source
    ///
    /// Fails with a configuration error if that source is unavailable; there
    /// is no fallback to a weaker generator.
    pub fn generate(&self) -> Result<GeneratedSecret, DomainError> {
        let mut random_bytes = [0u8; SECRET_RANDOM_BYTES];

        OsRng.try_fill_bytes(&mut random_bytes).map_err(|e| {
            DomainError::configuration(format!("Secure randomness source unavailable: {}", e))
        })?;

        Ok(self.from_random_bytes(&random_bytes))
    }

    /// Build a secret around known random bytes (for deterministic tests)
    pub fn from_random_bytes(&self, random_bytes: &[u8; SECRET_RANDOM_BYTES]) -> GeneratedSecret {
        let secret = format!("{}{}", self.prefix, hex::encode(random_bytes));
        let display_prefix = display_prefix(&secret).to_string();

        GeneratedSecret {
            secret,
            display_prefix,
        }
    }

    /// Whether the candidate has exactly the shape this generator produces
    ///
    /// Cheap check done before any hashing.
    pub fn is_well_formed(&self, candidate: &str) -> bool {
        let Some(random_part) = candidate.strip_prefix(self.prefix.as_str()) else {
            return false;
        };

        random_part.len() == SECRET_RANDOM_BYTES * 2
            && random_part
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl Default for KeyMaterialGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_PREFIX)
    }
}

/// Leading fragment of a secret retained for display
pub fn display_prefix(secret: &str) -> &str {
    let end = secret
        .char_indices()
        .nth(DISPLAY_PREFIX_LENGTH)
        .map(|(i, _)| i)
        .unwrap_or(secret.len());

    &secret[..end]
}
