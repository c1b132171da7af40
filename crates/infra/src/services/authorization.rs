//! Gate wiring: org policies, privileged-action MFA, denial auditing.

use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use orgcentral_auth::abac::AbacPolicy;
use orgcentral_auth::{
    AccessGrant, AuthorizationExplanation, OrgAccessRequest, RepositoryAuthorizationContext,
    SecurityPolicies, ensure_org_access, explain_authorization,
};
use orgcentral_core::{AuthorizationError, DomainError, DomainResult};

use crate::audit::{AuditEvent, AuditLogger, record_best_effort};
use crate::cache::{CACHE_SCOPE_ABAC_POLICIES, OrgCache};
use crate::repositories::AbacPolicyRepository;

pub const ACCESS_DENIED_ACTION: &str = "access_denied";

pub struct AuthorizationService {
    policies: Arc<dyn AbacPolicyRepository>,
    cache: Arc<OrgCache>,
    audit: Arc<dyn AuditLogger>,
    security: SecurityPolicies,
}

impl AuthorizationService {
    pub fn new(
        policies: Arc<dyn AbacPolicyRepository>,
        cache: Arc<OrgCache>,
        audit: Arc<dyn AuditLogger>,
        security: SecurityPolicies,
    ) -> Self {
        Self {
            policies,
            cache,
            audit,
            security,
        }
    }

    pub fn security_policies(&self) -> &SecurityPolicies {
        &self.security
    }

    /// The org's ABAC policies, read through the `org:abac-policies` scope.
    pub async fn load_policies(
        &self,
        ctx: &RepositoryAuthorizationContext,
    ) -> DomainResult<Vec<AbacPolicy>> {
        let org_id = ctx.org_id().clone();
        let read = self
            .cache
            .cached_read(ctx, &[CACHE_SCOPE_ABAC_POLICIES], org_id.as_str(), || async {
                self.policies.get_policies_for_org(&org_id).await
            })
            .await?;
        Ok(read.value)
    }

    /// Run the gate against the org's policies.
    ///
    /// Privileged actions force MFA even when the caller did not ask for it.
    /// Denials are audited under `access_denied`.
    pub async fn authorize(
        &self,
        ctx: &RepositoryAuthorizationContext,
        request: &OrgAccessRequest,
    ) -> DomainResult<AccessGrant> {
        let policies = self.load_policies(ctx).await?;
        let request = self.escalate(request);
        match ensure_org_access(ctx, &request, &policies) {
            Ok(grant) => Ok(grant),
            Err(err) => {
                self.record_denial(ctx, &request, &err).await;
                Err(DomainError::Authorization(err))
            }
        }
    }

    /// Run `operation` only after a successful check.
    pub async fn authorize_then<T, F, Fut>(
        &self,
        ctx: &RepositoryAuthorizationContext,
        request: &OrgAccessRequest,
        operation: F,
    ) -> DomainResult<T>
    where
        F: FnOnce(AccessGrant) -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let grant = self.authorize(ctx, request).await?;
        operation(grant).await
    }

    pub async fn explain(
        &self,
        ctx: &RepositoryAuthorizationContext,
        request: &OrgAccessRequest,
    ) -> DomainResult<AuthorizationExplanation> {
        let policies = self.load_policies(ctx).await?;
        Ok(explain_authorization(ctx, &self.escalate(request), &policies))
    }

    fn escalate(&self, request: &OrgAccessRequest) -> OrgAccessRequest {
        let mut request = request.clone();
        if request.requires_mfa {
            return request;
        }
        let explicit = request
            .action
            .as_deref()
            .is_some_and(|a| self.security.is_privileged_action(a));
        let required = request
            .required_permissions
            .iter()
            .chain(request.required_any_permissions.iter().flat_map(|p| p.iter()))
            .any(|(resource, action)| {
                self.security.is_privileged_action(action)
                    || self.security.is_privileged_action(&format!("{resource}.{action}"))
            });
        request.requires_mfa = explicit || required;
        request
    }

    async fn record_denial(
        &self,
        ctx: &RepositoryAuthorizationContext,
        request: &OrgAccessRequest,
        err: &AuthorizationError,
    ) {
        let resource = request
            .resource_type
            .clone()
            .or_else(|| request.required_permissions.resources().next().map(str::to_string))
            .unwrap_or_else(|| "organization".to_string());
        let required: Vec<String> = request
            .required_permissions
            .iter()
            .map(|(r, a)| format!("{r}:{a}"))
            .collect();
        let event = AuditEvent::from_context(
            ctx,
            ACCESS_DENIED_ACTION,
            resource,
            json!({
                "reason": err.reason().code(),
                "message": err.message(),
                "policy": err.policy(),
                "action": request.action,
                "required": required,
            }),
        );
        record_best_effort(self.audit.as_ref(), event).await;
    }
}
