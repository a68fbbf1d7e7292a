//! API key record and identifier types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_identifier, ApiKeyValidationError};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier after validation
            pub fn new(id: impl Into<String>) -> Result<Self, ApiKeyValidationError> {
                let id = id.into();
                validate_identifier($kind, &id)?;
                Ok(Self(id))
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ApiKeyValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Opaque API key identifier
    ApiKeyId,
    "API key ID"
);

string_id!(
    /// Identifier of the principal that owns keys
    OwnerId,
    "Owner ID"
);

string_id!(
    /// Identifier of a tenant sub-scope (sub-agency)
    ScopeId,
    "Scope ID"
);

impl ApiKeyId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// Identity of the user that owns a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOwner {
    pub id: OwnerId,
    pub email: String,
    pub name: String,
}

impl KeyOwner {
    pub fn new(id: OwnerId, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
        }
    }
}

/// Persisted API key metadata
///
/// The plaintext secret is never part of this record. `secret_hash` is the
/// salted slow hash, `lookup_hash` the keyed digest used to find the record.
#[derive(Clone)]
pub struct ApiKey {
    id: ApiKeyId,
    name: String,
    secret_hash: String,
    lookup_hash: String,
    display_prefix: String,
    owner_id: OwnerId,
    scope_id: Option<ScopeId>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Create a new API key record
    pub fn new(
        id: ApiKeyId,
        name: impl Into<String>,
        secret_hash: impl Into<String>,
        lookup_hash: impl Into<String>,
        display_prefix: impl Into<String>,
        owner_id: OwnerId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            secret_hash: secret_hash.into(),
            lookup_hash: lookup_hash.into(),
            display_prefix: display_prefix.into(),
            owner_id,
            scope_id: None,
            last_used_at: None,
            created_at,
            expires_at: None,
        }
    }

    /// Bind the key to a single scope
    pub fn with_scope(mut self, scope_id: ScopeId) -> Self {
        self.scope_id = Some(scope_id);
        self
    }

    /// Set an absolute expiry
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the last-used timestamp (when rehydrating from storage)
    pub fn with_last_used_at(mut self, last_used_at: DateTime<Utc>) -> Self {
        self.last_used_at = Some(last_used_at);
        self
    }

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn lookup_hash(&self) -> &str {
        &self.lookup_hash
    }

    pub fn display_prefix(&self) -> &str {
        &self.display_prefix
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn scope_id(&self) -> Option<&ScopeId> {
        self.scope_id.as_ref()
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the key has expired at the given instant
    ///
    /// A key expiring exactly at `now` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Record usage of the key
    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.last_used_at = Some(at);
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("display_prefix", &self.display_prefix)
            .field("owner_id", &self.owner_id)
            .field("scope_id", &self.scope_id)
            .field("last_used_at", &self.last_used_at)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// A key record joined with its owner's identity, as returned by lookups
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: ApiKey,
    pub owner: KeyOwner,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_api_key() -> ApiKey {
        ApiKey::new(
            ApiKeyId::new("key-1").unwrap(),
            "svc-key",
            "$argon2id$v=19$...",
            "lookup",
            "cfk_a1b2",
            OwnerId::new("user-1").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_identifier_validation() {
        assert!(ApiKeyId::new("abc123").is_ok());
        assert!(OwnerId::new("").is_err());
        assert!(ScopeId::new("scope a").is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ApiKeyId::generate(), ApiKeyId::generate());
    }

    #[test]
    fn test_identifier_serde_validates() {
        let ok: Result<ScopeId, _> = serde_json::from_str("\"scope-a\"");
        assert!(ok.is_ok());

        let bad: Result<ScopeId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let key = create_test_api_key();
        assert!(!key.is_expired_at(now));

        let key = key.with_expiration(now + Duration::days(30));
        assert!(!key.is_expired_at(now));
        assert!(key.is_expired_at(now + Duration::days(30)));
        assert!(key.is_expired_at(now + Duration::days(31)));
    }

    #[test]
    fn test_record_usage() {
        let mut key = create_test_api_key();
        assert!(key.last_used_at().is_none());

        let at = Utc::now();
        key.record_usage(at);
        assert_eq!(key.last_used_at(), Some(at));
    }

    #[test]
    fn test_debug_omits_hashes() {
        let key = create_test_api_key();
        let debug = format!("{:?}", key);

        assert!(debug.contains("cfk_a1b2"));
        assert!(!debug.contains("argon2id"));
        assert!(!debug.contains("lookup"));
    }
}
