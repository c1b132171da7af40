//! Cache-safe projection of the authorization context.
//!
//! The projection keeps only what can change the result of a cached read
//! (identity, permissions, classification, residency, ABAC attributes) and
//! drops per-request values: tokens, provenance, timestamps, correlation id.

use serde::Serialize;

use orgcentral_core::{DataClassification, DataResidency, OrgId, RoleId, UserId};

use crate::abac::AttributeMap;
use crate::context::RepositoryAuthorizationContext;
use crate::roles::{RoleKey, RoleScope};
use crate::PermissionMap;

/// Tenant scope without the per-write batch id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSafeTenantScope {
    pub org_id: OrgId,
    pub data_residency: DataResidency,
    pub data_classification: DataClassification,
    pub audit_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSafeAuthorizationContext {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role_key: RoleKey,
    pub role_name: Option<String>,
    pub role_id: Option<RoleId>,
    pub role_scope: RoleScope,
    pub permissions: PermissionMap,
    pub data_classification: DataClassification,
    pub data_residency: DataResidency,
    pub tenant_scope: CacheSafeTenantScope,
    pub abac_attributes: AttributeMap,
}

impl CacheSafeAuthorizationContext {
    /// Deterministic key material.
    ///
    /// All maps are ordered, so two contexts that differ only in dropped
    /// fields serialize identically.
    pub fn cache_key(&self) -> String {
        // Serializing plain data with ordered maps cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn to_cache_safe_authorization_context(
    ctx: &RepositoryAuthorizationContext,
) -> CacheSafeAuthorizationContext {
    let scope = ctx.tenant_scope();
    CacheSafeAuthorizationContext {
        org_id: ctx.org_id().clone(),
        user_id: ctx.user_id().clone(),
        role_key: ctx.role_key(),
        role_name: ctx.role_name().map(str::to_string),
        role_id: ctx.role_id().cloned(),
        role_scope: ctx.role_scope(),
        permissions: ctx.permissions().clone(),
        data_classification: ctx.data_classification(),
        data_residency: ctx.data_residency(),
        tenant_scope: CacheSafeTenantScope {
            org_id: scope.org_id.clone(),
            data_residency: scope.data_residency,
            data_classification: scope.data_classification,
            audit_source: scope.audit_source.clone(),
        },
        abac_attributes: ctx.abac_attributes().clone(),
    }
}

/// How a cached read must treat the shared cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Read through the shared cache.
    Shared,
    /// Always compute fresh; never read or write the shared cache.
    NoStore,
}

/// Only `OFFICIAL` contexts may use the shared cache.
pub fn cache_mode_for(ctx: &RepositoryAuthorizationContext) -> CacheMode {
    if ctx.data_classification().is_cache_eligible() {
        CacheMode::Shared
    } else {
        CacheMode::NoStore
    }
}
