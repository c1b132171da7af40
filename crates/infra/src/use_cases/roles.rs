//! Org role administration.
//!
//! Requested permissions are validated against the org's registry (static
//! statements plus its custom resources) before anything is persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use orgcentral_auth::roles::RoleScope;
use orgcentral_auth::{
    NewRole, OrgAccessRequest, PermissionMap, PermissionRegistry, RepositoryAuthorizationContext,
    Role, RoleUpdate, validate_role_permissions,
};
use orgcentral_core::{DomainError, DomainResult, RoleId};

use crate::audit::{AuditEvent, AuditLogger, record_best_effort};
use crate::cache::{CACHE_SCOPE_ROLES, OrgCache};
use crate::repositories::{PermissionResourceRepository, RoleRepository};
use crate::services::AuthorizationService;

pub const ROLE_RESOURCE: &str = "org.role";

#[derive(Clone)]
pub struct RoleAdminDeps {
    pub roles: Arc<dyn RoleRepository>,
    pub resources: Arc<dyn PermissionResourceRepository>,
    pub authorization: Arc<AuthorizationService>,
    pub cache: Arc<OrgCache>,
    pub audit: Arc<dyn AuditLogger>,
}

/// A tenant-authored role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub inherits_role_ids: Vec<RoleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinitionPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub inherits_role_ids: Option<Vec<RoleId>>,
}

pub async fn list_roles(
    deps: &RoleAdminDeps,
    ctx: &RepositoryAuthorizationContext,
) -> DomainResult<Vec<Role>> {
    deps.authorization
        .authorize(ctx, &OrgAccessRequest::new().requiring(ROLE_RESOURCE, "read"))
        .await?;
    let org_id = ctx.org_id().clone();
    let read = deps
        .cache
        .cached_read(ctx, &[CACHE_SCOPE_ROLES], org_id.as_str(), || async {
            deps.roles.get_roles_by_organization(&org_id).await
        })
        .await?;
    Ok(read.value)
}

pub async fn create_role(
    deps: &RoleAdminDeps,
    ctx: &RepositoryAuthorizationContext,
    definition: RoleDefinition,
) -> DomainResult<Role> {
    deps.authorization
        .authorize(ctx, &OrgAccessRequest::new().requiring(ROLE_RESOURCE, "create"))
        .await?;

    let name = definition.name.trim().to_string();
    if name.is_empty() {
        return Err(DomainError::validation("Role name cannot be empty."));
    }
    if deps.roles.get_role_by_name(ctx.org_id(), &name).await?.is_some() {
        return Err(DomainError::conflict(format!(
            "Role \"{name}\" already exists in this organization."
        )));
    }
    let permissions = validate_permissions(deps, ctx, &definition.permissions).await?;
    let inherits = validate_inherits(deps, ctx, definition.inherits_role_ids, None).await?;

    let role = deps
        .roles
        .create_role(
            ctx.org_id(),
            NewRole {
                name,
                description: definition.description,
                scope: RoleScope::Org,
                permissions,
                inherits_role_ids: inherits,
                is_system: false,
                is_default: false,
            },
        )
        .await?;

    finish_write(deps, ctx, "role.created", &role).await?;
    Ok(role)
}

/// Patch a tenant-authored role. System roles are owned by bootstrap.
pub async fn update_role(
    deps: &RoleAdminDeps,
    ctx: &RepositoryAuthorizationContext,
    role_id: &RoleId,
    patch: RoleDefinitionPatch,
) -> DomainResult<Role> {
    deps.authorization
        .authorize(ctx, &OrgAccessRequest::new().requiring(ROLE_RESOURCE, "update"))
        .await?;

    let existing = deps
        .roles
        .get_role(ctx.org_id(), role_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Role"))?;
    if existing.is_system {
        return Err(DomainError::validation(format!(
            "Role \"{}\" is a system role and cannot be edited.",
            existing.name
        )));
    }

    let permissions = match &patch.permissions {
        Some(requested) => Some(validate_permissions(deps, ctx, requested).await?),
        None => None,
    };
    let inherits_role_ids = match patch.inherits_role_ids {
        Some(ids) => Some(validate_inherits(deps, ctx, ids, Some(role_id)).await?),
        None => None,
    };

    let role = deps
        .roles
        .update_role(
            ctx.org_id(),
            role_id,
            RoleUpdate {
                description: patch.description,
                permissions,
                inherits_role_ids,
                ..RoleUpdate::default()
            },
        )
        .await?;

    finish_write(deps, ctx, "role.updated", &role).await?;
    Ok(role)
}

async fn validate_permissions(
    deps: &RoleAdminDeps,
    ctx: &RepositoryAuthorizationContext,
    requested: &BTreeMap<String, Vec<String>>,
) -> DomainResult<PermissionMap> {
    let resources = deps.resources.list_resources(ctx.org_id()).await?;
    let registry = PermissionRegistry::build(&resources);
    validate_role_permissions(&registry, requested)
}

/// Every inherited role must exist in the caller's org; a role cannot inherit itself.
async fn validate_inherits(
    deps: &RoleAdminDeps,
    ctx: &RepositoryAuthorizationContext,
    mut ids: Vec<RoleId>,
    own_id: Option<&RoleId>,
) -> DomainResult<Vec<RoleId>> {
    ids.sort();
    ids.dedup();
    for id in &ids {
        if Some(id) == own_id {
            return Err(DomainError::validation("A role cannot inherit from itself."));
        }
        if deps.roles.get_role(ctx.org_id(), id).await?.is_none() {
            return Err(DomainError::validation(format!(
                "Inherited role \"{id}\" does not exist in this organization."
            )));
        }
    }
    Ok(ids)
}

async fn finish_write(
    deps: &RoleAdminDeps,
    ctx: &RepositoryAuthorizationContext,
    action: &str,
    role: &Role,
) -> DomainResult<()> {
    deps.cache.invalidate_org_cache(
        ctx.org_id(),
        CACHE_SCOPE_ROLES,
        ctx.data_classification(),
        ctx.data_residency(),
    )?;
    record_best_effort(
        deps.audit.as_ref(),
        AuditEvent::from_context(
            ctx,
            action,
            ROLE_RESOURCE,
            json!({ "roleId": role.id, "name": role.name }),
        ),
    )
    .await;
    Ok(())
}
