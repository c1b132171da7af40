//! Write-time validation of ABAC policy sets.
//!
//! Every selector must resolve against an allowlist so that a typo cannot
//! produce a policy that silently never matches.

use std::collections::BTreeSet;

use orgcentral_core::{DomainError, DomainResult};

use super::defaults::default_bootstrap_policies;
use super::selector::WILDCARD;
use super::types::AbacPolicy;
use crate::permissions::{PermissionResource, ROLE_PERMISSION_STATEMENTS};

/// Cross-cutting system actions that are not registry statements.
pub const EXTRA_ALLOWED_ACTIONS: &[&str] = &[
    "org.abac.read",
    "org.abac.update",
    "org.organization.read",
    "org.organization.update",
    "org.role.list",
    "org.role.create",
    "org.role.update",
    "org.role.delete",
    "org.permissionResource.list",
    "org.permissionResource.get",
    "org.permissionResource.create",
    "org.permissionResource.update",
    "org.permissionResource.delete",
    "org.invitation.list",
    "org.invitation.create",
    "org.invitation.revoke",
    "org.invitation.resend",
    "notifications:list",
    "notifications:read",
    "notifications:compose",
    "notifications:delete",
    "auth.session.list",
    "auth.session.revoke",
    "notification.preference.update",
    "hr.onboarding.automation.apply",
];

pub const EXTRA_ALLOWED_RESOURCES: &[&str] = &[
    "org.abac.policy",
    "org.organization",
    "org.role",
    "org.permissionResource",
    "org.invitation",
    "org.membership",
    "org.leave-settings",
    "notification",
    "notification.preference",
    "auth.session",
    "platform.tenant",
    "appPermission",
    "enterpriseSettings",
    "security_event",
];

/// Known action and resource selectors for one organization.
#[derive(Debug, Clone, Default)]
pub struct SelectorAllowlist {
    actions: BTreeSet<String>,
    resources: BTreeSet<String>,
}

impl SelectorAllowlist {
    /// Registry statements, default policy selectors, the org's own
    /// resources, then the fixed extras.
    pub fn build(permission_resources: &[PermissionResource]) -> Self {
        let mut allowlist = Self::default();

        for (resource, actions) in ROLE_PERMISSION_STATEMENTS {
            allowlist.add_resource_actions(resource, actions.iter().copied());
        }

        for policy in default_bootstrap_policies() {
            allowlist.actions.extend(policy.actions);
            allowlist.resources.extend(policy.resources);
        }

        for resource in permission_resources {
            allowlist
                .add_resource_actions(&resource.resource, resource.actions.iter().map(String::as_str));
        }

        allowlist
            .actions
            .extend(EXTRA_ALLOWED_ACTIONS.iter().map(|a| a.to_string()));
        allowlist
            .resources
            .extend(EXTRA_ALLOWED_RESOURCES.iter().map(|r| r.to_string()));

        allowlist
    }

    /// Registers the resource, each bare action, and each `resource.action`.
    fn add_resource_actions<'a>(&mut self, resource: &str, actions: impl Iterator<Item = &'a str>) {
        self.resources.insert(resource.to_string());
        for action in actions {
            self.actions.insert(action.to_string());
            self.actions.insert(format!("{resource}.{action}"));
        }
    }

    pub fn allows_action(&self, selector: &str) -> bool {
        is_allowed_selector(selector, &self.actions)
    }

    pub fn allows_resource(&self, selector: &str) -> bool {
        is_allowed_selector(selector, &self.resources)
    }
}

/// `*`, an exact entry, or a non-empty, star-free prefix of at least one
/// concrete entry.
fn is_allowed_selector(selector: &str, allowlist: &BTreeSet<String>) -> bool {
    if selector == WILDCARD || allowlist.contains(selector) {
        return true;
    }
    let Some(prefix) = selector.strip_suffix('*') else {
        return false;
    };
    if prefix.is_empty() || prefix.contains('*') {
        return false;
    }
    allowlist
        .iter()
        .filter(|candidate| candidate.as_str() != WILDCARD)
        .any(|candidate| candidate.starts_with(prefix))
}

/// Reject the whole set on the first unknown selector.
pub fn assert_policies_use_known_selectors(
    allowlist: &SelectorAllowlist,
    policies: &[AbacPolicy],
) -> DomainResult<()> {
    for policy in policies {
        if let Some(action) = policy.actions.iter().find(|a| !allowlist.allows_action(a)) {
            return Err(DomainError::validation(format!(
                "ABAC policy \"{}\" contains unknown action selector \"{action}\".",
                policy.id
            )));
        }
        if let Some(resource) = policy.resources.iter().find(|r| !allowlist.allows_resource(r)) {
            return Err(DomainError::validation(format!(
                "ABAC policy \"{}\" contains unknown resource selector \"{resource}\".",
                policy.id
            )));
        }
    }
    Ok(())
}

/// Structural checks: non-empty unique ids and non-empty selector lists.
pub fn validate_policy_shape(policies: &[AbacPolicy]) -> DomainResult<()> {
    let mut seen = BTreeSet::new();
    for policy in policies {
        let id = policy.id.as_str().trim();
        if id.is_empty() {
            return Err(DomainError::validation("ABAC policy id cannot be empty."));
        }
        if !seen.insert(id) {
            return Err(DomainError::validation(format!(
                "ABAC policy id \"{id}\" is duplicated."
            )));
        }
        if policy.actions.is_empty() || policy.resources.is_empty() {
            return Err(DomainError::validation(format!(
                "ABAC policy \"{id}\" must name at least one action and one resource."
            )));
        }
    }
    Ok(())
}
