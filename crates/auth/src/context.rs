//! The per-request authorization context.
//!
//! A [`RepositoryAuthorizationContext`] is built once per request through
//! [`AuthorizationContextBuilder`] and is read-only afterwards. The builder
//! derives `tenant_scope` from the same values it stores, so the scope's org
//! can never disagree with the context's org.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use orgcentral_core::{DataClassification, DataResidency, OrgId, RoleId, TenantScope, UserId};

use crate::abac::{AbacSubject, AttributeMap, AttributeValue};
use crate::roles::{RoleKey, RoleScope};
use crate::PermissionMap;

pub const DEFAULT_AUDIT_SOURCE: &str = "api";

#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryAuthorizationContext {
    org_id: OrgId,
    user_id: UserId,
    role_key: RoleKey,
    role_name: Option<String>,
    role_id: Option<RoleId>,
    role_scope: RoleScope,
    permissions: PermissionMap,
    data_classification: DataClassification,
    data_residency: DataResidency,
    tenant_scope: TenantScope,
    correlation_id: String,
    session_id: Option<String>,
    session_token: Option<String>,
    mfa_verified: bool,
    requires_mfa: bool,
    pii_access_required: bool,
    data_breach_risk: bool,
    authenticated_at: Option<DateTime<Utc>>,
    session_expires_at: Option<DateTime<Utc>>,
    last_activity_at: Option<DateTime<Utc>>,
    authorized_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    abac_attributes: AttributeMap,
}

impl RepositoryAuthorizationContext {
    pub fn builder(org_id: OrgId, user_id: UserId) -> AuthorizationContextBuilder {
        AuthorizationContextBuilder::new(org_id, user_id)
    }

    pub fn org_id(&self) -> &OrgId {
        &self.org_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn role_key(&self) -> RoleKey {
        self.role_key
    }

    pub fn role_name(&self) -> Option<&str> {
        self.role_name.as_deref()
    }

    pub fn role_id(&self) -> Option<&RoleId> {
        self.role_id.as_ref()
    }

    pub fn role_scope(&self) -> RoleScope {
        self.role_scope
    }

    pub fn permissions(&self) -> &PermissionMap {
        &self.permissions
    }

    pub fn data_classification(&self) -> DataClassification {
        self.data_classification
    }

    pub fn data_residency(&self) -> DataResidency {
        self.data_residency
    }

    pub fn tenant_scope(&self) -> &TenantScope {
        &self.tenant_scope
    }

    pub fn audit_source(&self) -> &str {
        &self.tenant_scope.audit_source
    }

    pub fn audit_batch_id(&self) -> Option<&str> {
        self.tenant_scope.audit_batch_id.as_deref()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn mfa_verified(&self) -> bool {
        self.mfa_verified
    }

    pub fn requires_mfa(&self) -> bool {
        self.requires_mfa
    }

    pub fn pii_access_required(&self) -> bool {
        self.pii_access_required
    }

    pub fn data_breach_risk(&self) -> bool {
        self.data_breach_risk
    }

    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.authenticated_at
    }

    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.session_expires_at
    }

    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at
    }

    pub fn authorized_at(&self) -> DateTime<Utc> {
        self.authorized_at
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Attributes derived from the membership profile.
    pub fn abac_attributes(&self) -> &AttributeMap {
        &self.abac_attributes
    }

    /// Role tokens presented to ABAC: the role key, plus the role name when different.
    pub fn role_tokens(&self) -> Vec<String> {
        let mut tokens = vec![self.role_key.as_str().to_string()];
        if let Some(name) = self.role_name.as_deref() {
            if name != self.role_key.as_str() {
                tokens.push(name.to_string());
            }
        }
        tokens
    }

    /// ABAC subject: membership attributes plus the context's security posture.
    pub fn abac_subject(&self) -> AbacSubject {
        let mut attributes = self.abac_attributes.clone();
        attributes.insert("residency".into(), self.data_residency.as_str().into());
        attributes.insert("classification".into(), self.data_classification.as_str().into());
        attributes.insert("mfaVerified".into(), AttributeValue::Bool(self.mfa_verified));
        attributes.insert("requiresMfa".into(), AttributeValue::Bool(self.requires_mfa));
        attributes.insert(
            "piiAccessRequired".into(),
            AttributeValue::Bool(self.pii_access_required),
        );
        AbacSubject::new(
            self.org_id.clone(),
            self.user_id.clone(),
            self.role_tokens(),
            attributes,
        )
    }
}

/// Builder for [`RepositoryAuthorizationContext`].
#[derive(Debug, Clone)]
pub struct AuthorizationContextBuilder {
    org_id: OrgId,
    user_id: UserId,
    role_key: RoleKey,
    role_name: Option<String>,
    role_id: Option<RoleId>,
    role_scope: RoleScope,
    permissions: PermissionMap,
    data_classification: DataClassification,
    data_residency: DataResidency,
    audit_source: String,
    audit_batch_id: Option<String>,
    correlation_id: Option<String>,
    session_id: Option<String>,
    session_token: Option<String>,
    mfa_verified: bool,
    requires_mfa: bool,
    pii_access_required: bool,
    data_breach_risk: bool,
    authenticated_at: Option<DateTime<Utc>>,
    session_expires_at: Option<DateTime<Utc>>,
    last_activity_at: Option<DateTime<Utc>>,
    authorized_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    abac_attributes: AttributeMap,
}

impl AuthorizationContextBuilder {
    pub fn new(org_id: OrgId, user_id: UserId) -> Self {
        Self {
            org_id,
            user_id,
            role_key: RoleKey::Custom,
            role_name: None,
            role_id: None,
            role_scope: RoleScope::Org,
            permissions: PermissionMap::new(),
            data_classification: DataClassification::Official,
            data_residency: DataResidency::UkOnly,
            audit_source: DEFAULT_AUDIT_SOURCE.to_string(),
            audit_batch_id: None,
            correlation_id: None,
            session_id: None,
            session_token: None,
            mfa_verified: false,
            requires_mfa: false,
            pii_access_required: false,
            data_breach_risk: false,
            authenticated_at: None,
            session_expires_at: None,
            last_activity_at: None,
            authorized_at: None,
            ip_address: None,
            user_agent: None,
            abac_attributes: AttributeMap::new(),
        }
    }

    pub fn role(mut self, key: RoleKey, name: Option<String>, id: Option<RoleId>, scope: RoleScope) -> Self {
        self.role_key = key;
        self.role_name = name;
        self.role_id = id;
        self.role_scope = scope;
        self
    }

    pub fn permissions(mut self, permissions: PermissionMap) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn data_classification(mut self, classification: DataClassification) -> Self {
        self.data_classification = classification;
        self
    }

    pub fn data_residency(mut self, residency: DataResidency) -> Self {
        self.data_residency = residency;
        self
    }

    pub fn audit_source(mut self, source: impl Into<String>) -> Self {
        self.audit_source = source.into();
        self
    }

    pub fn audit_batch_id(mut self, batch_id: Option<String>) -> Self {
        self.audit_batch_id = batch_id;
        self
    }

    /// Keep the caller's correlation id; one is generated otherwise.
    pub fn correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn session(mut self, session_id: Option<String>, session_token: Option<String>) -> Self {
        self.session_id = session_id;
        self.session_token = session_token;
        self
    }

    pub fn mfa(mut self, verified: bool, required: bool) -> Self {
        self.mfa_verified = verified;
        self.requires_mfa = required;
        self
    }

    pub fn pii_access_required(mut self, required: bool) -> Self {
        self.pii_access_required = required;
        self
    }

    pub fn data_breach_risk(mut self, risk: bool) -> Self {
        self.data_breach_risk = risk;
        self
    }

    pub fn session_times(
        mut self,
        authenticated_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
        last_activity_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.authenticated_at = authenticated_at;
        self.session_expires_at = expires_at;
        self.last_activity_at = last_activity_at;
        self
    }

    pub fn authorized_at(mut self, at: DateTime<Utc>) -> Self {
        self.authorized_at = Some(at);
        self
    }

    pub fn provenance(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn abac_attributes(mut self, attributes: AttributeMap) -> Self {
        self.abac_attributes = attributes;
        self
    }

    pub fn build(self) -> RepositoryAuthorizationContext {
        let tenant_scope = TenantScope {
            org_id: self.org_id.clone(),
            data_residency: self.data_residency,
            data_classification: self.data_classification,
            audit_source: self.audit_source,
            audit_batch_id: self.audit_batch_id,
        };

        RepositoryAuthorizationContext {
            org_id: self.org_id,
            user_id: self.user_id,
            role_key: self.role_key,
            role_name: self.role_name,
            role_id: self.role_id,
            role_scope: self.role_scope,
            permissions: self.permissions,
            data_classification: self.data_classification,
            data_residency: self.data_residency,
            tenant_scope,
            correlation_id: self
                .correlation_id
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            session_id: self.session_id,
            session_token: self.session_token,
            mfa_verified: self.mfa_verified,
            requires_mfa: self.requires_mfa,
            pii_access_required: self.pii_access_required,
            data_breach_risk: self.data_breach_risk,
            authenticated_at: self.authenticated_at,
            session_expires_at: self.session_expires_at,
            last_activity_at: self.last_activity_at,
            authorized_at: self.authorized_at.unwrap_or_else(Utc::now),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            abac_attributes: self.abac_attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_scope_mirrors_context() {
        let ctx = RepositoryAuthorizationContext::builder(OrgId::new("org-1"), UserId::new("user-1"))
            .data_classification(DataClassification::Secret)
            .data_residency(DataResidency::UkAndEea)
            .audit_source("test:context")
            .build();

        assert_eq!(ctx.tenant_scope().org_id, *ctx.org_id());
        assert_eq!(ctx.tenant_scope().data_classification, DataClassification::Secret);
        assert_eq!(ctx.tenant_scope().data_residency, DataResidency::UkAndEea);
        assert_eq!(ctx.audit_source(), "test:context");
    }

    #[test]
    fn correlation_id_is_generated_when_missing_or_blank() {
        let a = RepositoryAuthorizationContext::builder(OrgId::new("o"), UserId::new("u"))
            .correlation_id(Some("  ".into()))
            .build();
        let b = RepositoryAuthorizationContext::builder(OrgId::new("o"), UserId::new("u")).build();
        assert!(!a.correlation_id().trim().is_empty());
        assert_ne!(a.correlation_id(), b.correlation_id());

        let kept = RepositoryAuthorizationContext::builder(OrgId::new("o"), UserId::new("u"))
            .correlation_id(Some("corr-1".into()))
            .build();
        assert_eq!(kept.correlation_id(), "corr-1");
    }

    #[test]
    fn abac_subject_carries_role_tokens_and_posture() {
        let ctx = RepositoryAuthorizationContext::builder(OrgId::new("org-1"), UserId::new("user-1"))
            .role(RoleKey::Custom, Some("Payroll Clerk".into()), None, RoleScope::Org)
            .mfa(true, false)
            .build();

        let subject = ctx.abac_subject();
        assert_eq!(subject.roles, vec!["custom".to_string(), "Payroll Clerk".to_string()]);
        assert_eq!(subject.attributes.get("userId"), Some(&"user-1".into()));
        assert_eq!(subject.attributes.get("classification"), Some(&"OFFICIAL".into()));
        assert_eq!(subject.attributes.get("mfaVerified"), Some(&AttributeValue::Bool(true)));
    }
}
