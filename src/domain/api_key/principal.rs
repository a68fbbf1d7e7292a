//! Authenticated principal produced per request

use serde::Serialize;

use super::entity::{ApiKeyId, KeyLookup, OwnerId, ScopeId};

/// How a principal was authenticated
///
/// Serialized so downstream services can tell key-derived principals from
/// the session principals they build themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Derived from a programmatic API key
    ApiKey,
}

/// Caller identity for the duration of one request
///
/// Built fresh by the authenticator; never cached or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedPrincipal {
    pub id: OwnerId,
    pub email: String,
    pub name: String,
    /// Scope the key is bound to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<ScopeId>,
    /// Originating key, for audit correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<ApiKeyId>,
    pub kind: PrincipalKind,
}

impl AuthenticatedPrincipal {
    /// Build a key-derived principal from a successful lookup
    pub fn from_key(lookup: &KeyLookup) -> Self {
        Self {
            id: lookup.owner.id.clone(),
            email: lookup.owner.email.clone(),
            name: lookup.owner.name.clone(),
            scope_id: lookup.key.scope_id().cloned(),
            key_id: Some(lookup.key.id().clone()),
            kind: PrincipalKind::ApiKey,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::{ApiKey, KeyOwner};
    use chrono::Utc;

    #[test]
    fn test_from_key_copies_owner_and_scope() {
        let owner = KeyOwner::new(OwnerId::new("user-1").unwrap(), "a@b.c", "Ada");
        let key = ApiKey::new(
            ApiKeyId::new("key-1").unwrap(),
            "svc-key",
            "hash",
            "lookup",
            "cfk_a1b2",
            owner.id.clone(),
            Utc::now(),
        )
        .with_scope(ScopeId::new("scope-a").unwrap());

        let principal = AuthenticatedPrincipal::from_key(&KeyLookup { key, owner });

        assert_eq!(principal.id.as_str(), "user-1");
        assert_eq!(principal.email, "a@b.c");
        assert_eq!(principal.scope_id.as_ref().map(|s| s.as_str()), Some("scope-a"));
        assert_eq!(principal.key_id.as_ref().map(|k| k.as_str()), Some("key-1"));
        assert_eq!(principal.kind, PrincipalKind::ApiKey);
    }

    #[test]
    fn test_serialization_marks_kind() {
        let principal = AuthenticatedPrincipal {
            id: OwnerId::new("user-1").unwrap(),
            email: "a@b.c".into(),
            name: "Ada".into(),
            scope_id: None,
            key_id: None,
            kind: PrincipalKind::ApiKey,
        };

        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["kind"], "api_key");
        assert!(json.get("scope_id").is_none());
    }
}
