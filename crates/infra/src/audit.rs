//! Audit trail collaborator.
//!
//! Recording is synchronous from the caller's point of view (the call is
//! awaited before the operation returns) but a failing audit sink never
//! fails the operation: use [`record_best_effort`].

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use orgcentral_auth::{RepositoryAuthorizationContext, SecurityEvent};
use orgcentral_core::{DataClassification, DataResidency, DomainError, DomainResult, OrgId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub org_id: OrgId,
    pub user_id: Option<UserId>,
    pub action: String,
    pub resource: String,
    pub payload: serde_json::Value,
    pub classification: DataClassification,
    pub residency_zone: DataResidency,
    pub audit_source: String,
    pub audit_batch_id: Option<String>,
    pub correlation_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Event attributed to the caller of `ctx`.
    pub fn from_context(
        ctx: &RepositoryAuthorizationContext,
        action: impl Into<String>,
        resource: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            org_id: ctx.org_id().clone(),
            user_id: Some(ctx.user_id().clone()),
            action: action.into(),
            resource: resource.into(),
            payload,
            classification: ctx.data_classification(),
            residency_zone: ctx.data_residency(),
            audit_source: ctx.audit_source().to_string(),
            audit_batch_id: ctx.audit_batch_id().map(str::to_string),
            correlation_id: Some(ctx.correlation_id().to_string()),
            recorded_at: Utc::now(),
        }
    }

    /// A guard violation, recorded under its security event type.
    pub fn security(ctx: &RepositoryAuthorizationContext, event: &SecurityEvent) -> Self {
        let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        Self::from_context(ctx, event.event_type, event.resource_type.clone(), payload)
    }
}

#[async_trait::async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record_audit_event(&self, event: AuditEvent) -> DomainResult<()>;
}

/// Record and swallow sink failures with a warning.
pub async fn record_best_effort(logger: &dyn AuditLogger, event: AuditEvent) {
    let action = event.action.clone();
    if let Err(err) = logger.record_audit_event(event).await {
        tracing::warn!(%action, error = %err, "failed to record audit event");
    }
}

pub const DEFAULT_AUDIT_BUFFER_CAPACITY: usize = 1024;

/// Keeps the most recent events in memory, dropping the oldest once full.
#[derive(Debug)]
pub struct InMemoryAuditLog {
    events: RwLock<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_BUFFER_CAPACITY)
    }
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_AUDIT_BUFFER_CAPACITY))),
            capacity,
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn events_with_action(&self, action: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

#[async_trait::async_trait]
impl AuditLogger for InMemoryAuditLog {
    async fn record_audit_event(&self, event: AuditEvent) -> DomainResult<()> {
        let mut events = self
            .events
            .write()
            .map_err(|_| DomainError::repository("audit log lock poisoned"))?;
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }
}

/// Emits every event as a structured `tracing` record on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

#[async_trait::async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn record_audit_event(&self, event: AuditEvent) -> DomainResult<()> {
        tracing::info!(
            target: "audit",
            org_id = %event.org_id,
            user_id = event.user_id.as_ref().map(|u| u.as_str()),
            action = %event.action,
            resource = %event.resource,
            classification = %event.classification,
            residency = %event.residency_zone,
            audit_source = %event.audit_source,
            correlation_id = event.correlation_id.as_deref(),
            payload = %event.payload,
            "audit event"
        );
        Ok(())
    }
}

/// Delivers each event to every sink; reports the first failure after all
/// sinks have been tried.
#[derive(Clone, Default)]
pub struct AuditFanOut {
    sinks: Vec<Arc<dyn AuditLogger>>,
}

impl AuditFanOut {
    pub fn new(sinks: Vec<Arc<dyn AuditLogger>>) -> Self {
        Self { sinks }
    }
}

#[async_trait::async_trait]
impl AuditLogger for AuditFanOut {
    async fn record_audit_event(&self, event: AuditEvent) -> DomainResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.record_audit_event(event.clone()).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Masks sensitive payload keys, at any depth, before forwarding.
pub struct RedactingAuditLogger {
    inner: Arc<dyn AuditLogger>,
    fields: Vec<String>,
}

pub const REDACTED: &str = "[REDACTED]";

impl RedactingAuditLogger {
    pub fn new(inner: Arc<dyn AuditLogger>, fields: Vec<String>) -> Self {
        Self { inner, fields }
    }

    fn redact(&self, value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, field) in map.iter_mut() {
                    if self.fields.iter().any(|f| f == key) {
                        *field = serde_json::Value::String(REDACTED.to_string());
                    } else {
                        self.redact(field);
                    }
                }
            }
            serde_json::Value::Array(items) => items.iter_mut().for_each(|item| self.redact(item)),
            _ => {}
        }
    }
}

#[async_trait::async_trait]
impl AuditLogger for RedactingAuditLogger {
    async fn record_audit_event(&self, mut event: AuditEvent) -> DomainResult<()> {
        if !self.fields.is_empty() {
            self.redact(&mut event.payload);
        }
        self.inner.record_audit_event(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgcentral_auth::context::AuthorizationContextBuilder;
    use serde_json::json;

    struct FailingSink;

    #[async_trait::async_trait]
    impl AuditLogger for FailingSink {
        async fn record_audit_event(&self, _event: AuditEvent) -> DomainResult<()> {
            Err(DomainError::repository("sink offline"))
        }
    }

    fn ctx() -> RepositoryAuthorizationContext {
        AuthorizationContextBuilder::new(OrgId::new("org-1"), UserId::new("admin-1"))
            .audit_source("test:audit")
            .correlation_id(Some("corr-1".into()))
            .build()
    }

    #[tokio::test]
    async fn events_carry_context_scope() {
        let log = InMemoryAuditLog::new();
        record_best_effort(&log, AuditEvent::from_context(&ctx(), "abac.set", "org.abac.policy", json!({ "policyCount": 2 }))).await;

        let events = log.events_with_action("abac.set");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].org_id, OrgId::new("org-1"));
        assert_eq!(events[0].audit_source, "test:audit");
        assert_eq!(events[0].correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(events[0].payload["policyCount"], 2);
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed() {
        record_best_effort(&FailingSink, AuditEvent::from_context(&ctx(), "x", "y", json!({}))).await;
    }

    #[tokio::test]
    async fn fan_out_reaches_every_sink_despite_failures() {
        let log = Arc::new(InMemoryAuditLog::new());
        let fan_out = AuditFanOut::new(vec![Arc::new(FailingSink), log.clone(), Arc::new(TracingAuditLogger)]);
        let result = fan_out
            .record_audit_event(AuditEvent::from_context(&ctx(), "role.created", "org.role", json!({})))
            .await;
        assert_eq!(result, Err(DomainError::repository("sink offline")));
        assert_eq!(log.events_with_action("role.created").len(), 1);
    }

    #[tokio::test]
    async fn buffer_keeps_only_the_newest_events() {
        let log = InMemoryAuditLog::with_capacity(3);
        for i in 0..10 {
            log.record_audit_event(AuditEvent::from_context(&ctx(), format!("a{i}"), "y", json!({})))
                .await
                .unwrap();
        }
        let actions: Vec<String> = log.events().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["a7", "a8", "a9"]);
    }

    #[tokio::test]
    async fn sensitive_fields_are_masked_at_any_depth() {
        let log = Arc::new(InMemoryAuditLog::new());
        let redacting = RedactingAuditLogger::new(log.clone(), vec!["niNumber".into()]);
        redacting
            .record_audit_event(AuditEvent::from_context(
                &ctx(),
                "hr.profile.read",
                "hr.people.profile",
                json!({ "niNumber": "QQ123456C", "changes": [{ "niNumber": "AB1" }], "profileId": "p-1" }),
            ))
            .await
            .unwrap();

        let payload = &log.events()[0].payload;
        assert_eq!(payload["niNumber"], REDACTED);
        assert_eq!(payload["changes"][0]["niNumber"], REDACTED);
        assert_eq!(payload["profileId"], "p-1");
    }
}
