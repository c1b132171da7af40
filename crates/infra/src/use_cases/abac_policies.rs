//! ABAC policy administration.
//!
//! ```text
//! set_abac_policies
//!   ↓
//! 1. Gate `org.abac.policy:update`
//!   ↓
//! 2. Shape checks, then selectors against the org allowlist (all-or-nothing)
//!   ↓
//! 3. Full replace of the org's policy list (last write wins)
//!   ↓
//! 4. Invalidate `org:abac-policies`
//!   ↓
//! 5. Audit `abac.set` with the policy count
//! ```

use std::sync::Arc;

use serde_json::json;

use orgcentral_auth::abac::{
    AbacPolicy, SelectorAllowlist, assert_policies_use_known_selectors, validate_policy_shape,
};
use orgcentral_auth::{OrgAccessRequest, RepositoryAuthorizationContext};
use orgcentral_core::DomainResult;

use crate::audit::{AuditEvent, AuditLogger, record_best_effort};
use crate::cache::{CACHE_SCOPE_ABAC_POLICIES, OrgCache};
use crate::repositories::{AbacPolicyRepository, PermissionResourceRepository};
use crate::services::AuthorizationService;

pub const ABAC_POLICY_RESOURCE: &str = "org.abac.policy";
pub const ABAC_SET_AUDIT_ACTION: &str = "abac.set";

#[derive(Clone)]
pub struct AbacPolicyDeps {
    pub policies: Arc<dyn AbacPolicyRepository>,
    pub resources: Arc<dyn PermissionResourceRepository>,
    pub authorization: Arc<AuthorizationService>,
    pub cache: Arc<OrgCache>,
    pub audit: Arc<dyn AuditLogger>,
}

/// Replace the caller's org policy set. Returns the persisted list in
/// submission order.
#[tracing::instrument(level = "debug", skip_all, fields(org_id = %ctx.org_id(), count = policies.len()))]
pub async fn set_abac_policies(
    deps: &AbacPolicyDeps,
    ctx: &RepositoryAuthorizationContext,
    policies: Vec<AbacPolicy>,
) -> DomainResult<Vec<AbacPolicy>> {
    let request = OrgAccessRequest::new().requiring(ABAC_POLICY_RESOURCE, "update");
    deps.authorization.authorize(ctx, &request).await?;

    validate_policy_shape(&policies)?;
    let org_resources = deps.resources.list_resources(ctx.org_id()).await?;
    let allowlist = SelectorAllowlist::build(&org_resources);
    assert_policies_use_known_selectors(&allowlist, &policies)?;

    let persisted = deps
        .policies
        .set_policies_for_org(ctx.org_id(), policies)
        .await?;

    deps.cache.invalidate_org_cache(
        ctx.org_id(),
        CACHE_SCOPE_ABAC_POLICIES,
        ctx.data_classification(),
        ctx.data_residency(),
    )?;

    record_best_effort(
        deps.audit.as_ref(),
        AuditEvent::from_context(
            ctx,
            ABAC_SET_AUDIT_ACTION,
            ABAC_POLICY_RESOURCE,
            json!({ "policyCount": persisted.len() }),
        ),
    )
    .await;

    Ok(persisted)
}

pub async fn get_abac_policies(
    deps: &AbacPolicyDeps,
    ctx: &RepositoryAuthorizationContext,
) -> DomainResult<Vec<AbacPolicy>> {
    let request = OrgAccessRequest::new().requiring(ABAC_POLICY_RESOURCE, "read");
    deps.authorization.authorize(ctx, &request).await?;
    deps.authorization.load_policies(ctx).await
}
