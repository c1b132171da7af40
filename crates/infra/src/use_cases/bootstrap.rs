//! Per-organization bootstrap: builtin roles and seed ABAC policies.
//!
//! Both operations are idempotent and safe to re-run after a partial failure.
//! Repository errors propagate unchanged.

use std::collections::BTreeMap;

use orgcentral_auth::abac::{AbacPolicy, default_bootstrap_policies};
use orgcentral_auth::roles::{
    ROLE_TEMPLATES, TENANT_ROLE_KEYS, role_drifted_from_template, role_template,
};
use orgcentral_auth::{NewRole, Role, RoleUpdate};
use orgcentral_core::{DomainResult, OrgId, RoleId};

use crate::repositories::{AbacPolicyRepository, RoleRepository};

/// Create missing builtin roles, heal drifted system roles, then link
/// inheritance.
///
/// ```text
/// existing roles ──► for each template key
///                      ├─ missing        → create
///                      ├─ system+drifted → update from template
///                      └─ otherwise      → leave alone
/// re-fetch ──► resolve `inherits` names into role ids (system roles only)
/// ```
///
/// Returns the org's roles after both passes.
#[tracing::instrument(level = "debug", skip(roles, org_id), fields(org_id = %org_id))]
pub async fn ensure_builtin_roles(
    roles: &dyn RoleRepository,
    org_id: &OrgId,
) -> DomainResult<Vec<Role>> {
    let existing = roles.get_roles_by_organization(org_id).await?;
    let by_name: BTreeMap<&str, &Role> = existing.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut created = 0usize;
    let mut healed = 0usize;
    for key in TENANT_ROLE_KEYS {
        let Some(template) = role_template(*key) else {
            continue;
        };
        match by_name.get(template.name) {
            Some(role) if role.is_system && role_drifted_from_template(role, template) => {
                roles
                    .update_role(org_id, &role.id, RoleUpdate::sync_from_template(template))
                    .await?;
                healed += 1;
            }
            Some(_) => {}
            None => {
                roles.create_role(org_id, NewRole::from_template(template)).await?;
                created += 1;
            }
        }
    }

    // Ids only exist after creation, so inheritance is a second pass.
    let current = roles.get_roles_by_organization(org_id).await?;
    let ids: BTreeMap<&str, &RoleId> = current.iter().map(|r| (r.name.as_str(), &r.id)).collect();
    let mut linked = 0usize;
    for template in ROLE_TEMPLATES.iter().filter(|t| !t.inherits.is_empty()) {
        let Some(role) = current.iter().find(|r| r.name == template.name) else {
            continue;
        };
        if !role.is_system {
            continue;
        }
        let mut inherits: Vec<RoleId> = template
            .inherits
            .iter()
            .filter_map(|name| ids.get(name).map(|id| (*id).clone()))
            .collect();
        inherits.sort();
        inherits.dedup();

        let mut current_ids = role.inherits_role_ids.clone();
        current_ids.sort();
        if current_ids != inherits {
            let update = RoleUpdate {
                inherits_role_ids: Some(inherits),
                ..RoleUpdate::default()
            };
            roles.update_role(org_id, &role.id, update).await?;
            linked += 1;
        }
    }

    if created + healed + linked > 0 {
        tracing::info!(org_id = %org_id, created, healed, linked, "builtin roles synced");
    }

    roles.get_roles_by_organization(org_id).await
}

/// Seed the default policies when the org has none. Returns the org's policies.
pub async fn ensure_abac_policies(
    policies: &dyn AbacPolicyRepository,
    org_id: &OrgId,
) -> DomainResult<Vec<AbacPolicy>> {
    let existing = policies.get_policies_for_org(org_id).await?;
    if !existing.is_empty() {
        return Ok(existing);
    }
    tracing::info!(org_id = %org_id, "seeding default ABAC policies");
    policies
        .set_policies_for_org(org_id, default_bootstrap_policies())
        .await
}
