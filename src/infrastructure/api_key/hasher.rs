//! Secret hashing using Argon2
//!
//! Two digests are kept per key. The Argon2id PHC string is salted and slow,
//! used to verify a presented secret. The HMAC-SHA256 lookup digest is
//! deterministic under a server-side pepper, used only to find the record.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashingParams {
    /// Cheapest parameters argon2 accepts, for tests only
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }
}

/// Slow salted hashing plus keyed lookup digests for API key secrets
#[derive(Clone)]
pub struct KeyHasher {
    argon2: Argon2<'static>,
    lookup_mac: HmacSha256,
}

impl std::fmt::Debug for KeyHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHasher").finish_non_exhaustive()
    }
}

impl KeyHasher {
    pub fn new(params: HashingParams, lookup_pepper: impl AsRef<[u8]>) -> Result<Self, DomainError> {
        let lookup_pepper = lookup_pepper.as_ref();
        if lookup_pepper.is_empty() {
            return Err(DomainError::configuration("Lookup pepper must not be empty"));
        }

        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| DomainError::configuration(format!("Invalid hashing parameters: {}", e)))?;

        let lookup_mac = HmacSha256::new_from_slice(lookup_pepper)
            .map_err(|e| DomainError::configuration(format!("Invalid lookup pepper: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            lookup_mac,
        })
    }

    /// Hash a secret with a fresh random salt
    ///
    /// Two calls on the same input produce different strings.
    pub fn hash(&self, secret: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::internal(format!("Failed to hash secret: {}", e)))
    }

    /// Check a candidate against a stored PHC string
    ///
    /// The comparison inside argon2 runs in constant time. An unparseable
    /// stored hash is treated as a mismatch.
    pub fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
            return false;
        };

        self.argon2
            .verify_password(candidate.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Deterministic keyed digest used to find a record by secret
    pub fn lookup_digest(&self, secret: &str) -> String {
        let mut mac = self.lookup_mac.clone();
        mac.update(secret.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::api_key::KeyMaterialGenerator;

    fn hasher() -> KeyHasher {
        KeyHasher::new(HashingParams::insecure_fast(), "test-pepper").unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let secret = format!("cfk_{}", "1f".repeat(32));

        let hash = hasher.hash(&secret).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(&secret, &hash));
        assert!(!hasher.verify(&format!("cfk_{}", "2f".repeat(32)), &hash));
    }

    #[test]
    fn test_single_character_change_fails_verification() {
        let hasher = hasher();
        let secret = KeyMaterialGenerator::new("cfk_").generate().unwrap().secret;
        let hash = hasher.hash(&secret).unwrap();

        for (position, original) in secret.char_indices() {
            let replacement = if original == '0' { '1' } else { '0' };
            let mut altered = secret.clone();
            altered.replace_range(position..position + 1, &replacement.to_string());

            assert!(
                !hasher.verify(&altered, &hash),
                "altered position {} still verified",
                position
            );
        }
        assert!(hasher.verify(&secret, &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = hasher();
        let secret = "cfk_same_input";

        let hash1 = hasher.hash(secret).unwrap();
        let hash2 = hasher.hash(secret).unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify(secret, &hash1));
        assert!(hasher.verify(secret, &hash2));
    }

    #[test]
    fn test_verify_invalid_hash() {
        let hasher = hasher();

        assert!(!hasher.verify("secret", "not-a-phc-string"));
        assert!(!hasher.verify("secret", ""));
    }

    #[test]
    fn test_lookup_digest_is_deterministic() {
        let hasher = hasher();

        let first = hasher.lookup_digest("cfk_abc");
        let second = hasher.lookup_digest("cfk_abc");

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_ne!(first, hasher.lookup_digest("cfk_abd"));
    }

    #[test]
    fn test_lookup_digest_depends_on_pepper() {
        let a = KeyHasher::new(HashingParams::insecure_fast(), "pepper-a").unwrap();
        let b = KeyHasher::new(HashingParams::insecure_fast(), "pepper-b").unwrap();

        assert_ne!(a.lookup_digest("cfk_abc"), b.lookup_digest("cfk_abc"));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(matches!(
            KeyHasher::new(HashingParams::insecure_fast(), ""),
            Err(DomainError::Configuration { .. })
        ));

        let params = HashingParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            KeyHasher::new(params, "pepper"),
            Err(DomainError::Configuration { .. })
        ));
    }
}
