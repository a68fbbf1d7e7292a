//! Audit event types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::api_key::{ApiKey, ApiKeyId, OwnerId, ScopeId};

/// Kind of key lifecycle or authentication occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    KeyCreated,
    KeyDeleted,
    KeyUsed,
    KeyAuthFailed,
    ScopeDenied,
    KeyCreationRateLimited,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyCreated => "key_created",
            Self::KeyDeleted => "key_deleted",
            Self::KeyUsed => "key_used",
            Self::KeyAuthFailed => "key_auth_failed",
            Self::ScopeDenied => "scope_denied",
            Self::KeyCreationRateLimited => "key_creation_rate_limited",
        }
    }

    /// Failure events are surfaced at a higher severity
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::KeyAuthFailed | Self::ScopeDenied | Self::KeyCreationRateLimited
        )
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal cause of an authentication failure
///
/// Recorded in the audit trail only; callers always see the same message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureReason {
    Missing,
    Malformed,
    NotFound,
    HashMismatch,
    Expired,
    GatewayError,
    Internal,
}

impl AuthFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Malformed => "malformed",
            Self::NotFound => "not_found",
            Self::HashMismatch => "hash_mismatch",
            Self::Expired => "expired",
            Self::GatewayError => "gateway_error",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const UNKNOWN: &str = "unknown";

/// Origin details of the request that caused an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestMetadata {
    pub ip_address: String,
    pub user_agent: String,
}

impl RequestMetadata {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address: ip_address.unwrap_or_else(|| UNKNOWN.to_string()),
            user_agent: user_agent.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    pub fn unknown() -> Self {
        Self::new(None, None)
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Immutable record of one authentication or key-lifecycle occurrence
///
/// Built only through the named constructors and read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    kind: AuditEventKind,
    /// Owner of the key, or `unknown` when authentication failed
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<ApiKeyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope_id: Option<ScopeId>,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    request: RequestMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<AuthFailureReason>,
}

impl AuditEvent {
    fn base(kind: AuditEventKind, user_id: String, timestamp: DateTime<Utc>, request: RequestMetadata) -> Self {
        Self {
            kind,
            user_id,
            key_id: None,
            key_name: None,
            scope_id: None,
            timestamp,
            request,
            reason: None,
        }
    }

    fn for_key(
        kind: AuditEventKind,
        key: &ApiKey,
        timestamp: DateTime<Utc>,
        request: RequestMetadata,
    ) -> Self {
        Self {
            key_id: Some(key.id().clone()),
            key_name: Some(key.name().to_string()),
            scope_id: key.scope_id().cloned(),
            ..Self::base(kind, key.owner_id().to_string(), timestamp, request)
        }
    }

    pub fn key_created(key: &ApiKey, timestamp: DateTime<Utc>, request: RequestMetadata) -> Self {
        Self::for_key(AuditEventKind::KeyCreated, key, timestamp, request)
    }

    pub fn key_deleted(key: &ApiKey, timestamp: DateTime<Utc>, request: RequestMetadata) -> Self {
        Self::for_key(AuditEventKind::KeyDeleted, key, timestamp, request)
    }

    pub fn key_used(key: &ApiKey, timestamp: DateTime<Utc>, request: RequestMetadata) -> Self {
        Self::for_key(AuditEventKind::KeyUsed, key, timestamp, request)
    }

    pub fn auth_failed(
        reason: AuthFailureReason,
        timestamp: DateTime<Utc>,
        request: RequestMetadata,
    ) -> Self {
        Self {
            reason: Some(reason),
            ..Self::base(AuditEventKind::KeyAuthFailed, UNKNOWN.to_string(), timestamp, request)
        }
    }

    pub fn scope_denied(
        user_id: &OwnerId,
        key_id: Option<ApiKeyId>,
        requested: &ScopeId,
        timestamp: DateTime<Utc>,
        request: RequestMetadata,
    ) -> Self {
        Self {
            key_id,
            scope_id: Some(requested.clone()),
            ..Self::base(AuditEventKind::ScopeDenied, user_id.to_string(), timestamp, request)
        }
    }

    pub fn creation_rate_limited(
        user_id: &OwnerId,
        timestamp: DateTime<Utc>,
        request: RequestMetadata,
    ) -> Self {
        Self::base(
            AuditEventKind::KeyCreationRateLimited,
            user_id.to_string(),
            timestamp,
            request,
        )
    }

    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn key_id(&self) -> Option<&ApiKeyId> {
        self.key_id.as_ref()
    }

    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    pub fn scope_id(&self) -> Option<&ScopeId> {
        self.scope_id.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn request(&self) -> &RequestMetadata {
        &self.request
    }

    pub fn reason(&self) -> Option<AuthFailureReason> {
        self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        assert!(AuditEventKind::KeyAuthFailed.is_failure());
        assert!(AuditEventKind::ScopeDenied.is_failure());
        assert!(AuditEventKind::KeyCreationRateLimited.is_failure());
        assert!(!AuditEventKind::KeyUsed.is_failure());
        assert!(!AuditEventKind::KeyCreated.is_failure());
        assert!(!AuditEventKind::KeyDeleted.is_failure());
    }

    #[test]
    fn test_auth_failed_has_unknown_user() {
        let event = AuditEvent::auth_failed(
            AuthFailureReason::Expired,
            Utc::now(),
            RequestMetadata::unknown(),
        );

        assert_eq!(event.kind(), AuditEventKind::KeyAuthFailed);
        assert_eq!(event.user_id(), "unknown");
        assert_eq!(event.reason(), Some(AuthFailureReason::Expired));
        assert!(event.key_id().is_none());
        assert!(event.key_name().is_none());
    }

    #[test]
    fn test_key_events_copy_key_details() {
        let at = Utc::now();
        let key = ApiKey::new(
            ApiKeyId::new("key-1").unwrap(),
            "svc-key",
            "hash",
            "lookup",
            "cfk_a1b2",
            OwnerId::new("user-1").unwrap(),
            at,
        )
        .with_scope(ScopeId::new("scope-a").unwrap());
        let request = RequestMetadata::new(Some("10.0.0.1".into()), Some("cli/2".into()));

        let event = AuditEvent::key_deleted(&key, at, request.clone());

        assert_eq!(event.kind(), AuditEventKind::KeyDeleted);
        assert_eq!(event.user_id(), "user-1");
        assert_eq!(event.key_id().map(|k| k.as_str()), Some("key-1"));
        assert_eq!(event.key_name(), Some("svc-key"));
        assert_eq!(event.scope_id().map(|s| s.as_str()), Some("scope-a"));
        assert_eq!(event.timestamp(), at);
        assert_eq!(event.request(), &request);
        assert!(event.reason().is_none());
    }

    #[test]
    fn test_event_serialization_is_flat() {
        let event = AuditEvent::auth_failed(
            AuthFailureReason::Malformed,
            Utc::now(),
            RequestMetadata::new(Some("10.0.0.1".into()), None),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "key_auth_failed");
        assert_eq!(json["ip_address"], "10.0.0.1");
        assert_eq!(json["user_agent"], "unknown");
        assert_eq!(json["reason"], "malformed");
    }
}
