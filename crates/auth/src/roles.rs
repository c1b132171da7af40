//! Built-in tenant roles.
//!
//! Role templates are static data. Each organization gets concrete [`Role`]
//! rows synced from these templates at bootstrap; template inheritance is
//! declared by name and resolved into role ids once all rows exist.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orgcentral_core::{OrgId, RoleId, TenantScoped};

use crate::PermissionMap;

/// Coarse role discriminator carried on the authorization context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKey {
    #[serde(rename = "owner")]
    Owner,
    #[serde(rename = "orgAdmin")]
    OrgAdmin,
    #[serde(rename = "hrAdmin")]
    HrAdmin,
    #[serde(rename = "manager")]
    Manager,
    #[serde(rename = "compliance")]
    Compliance,
    #[serde(rename = "member")]
    Member,
    /// Platform operator acting across tenants.
    #[serde(rename = "globalAdmin")]
    GlobalAdmin,
    /// Any org-defined role without a template.
    #[serde(rename = "custom")]
    Custom,
}

impl RoleKey {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleKey::Owner => "owner",
            RoleKey::OrgAdmin => "orgAdmin",
            RoleKey::HrAdmin => "hrAdmin",
            RoleKey::Manager => "manager",
            RoleKey::Compliance => "compliance",
            RoleKey::Member => "member",
            RoleKey::GlobalAdmin => "globalAdmin",
            RoleKey::Custom => "custom",
        }
    }

    /// Map a persisted role name to its key; unknown names are `Custom`.
    pub fn from_role_name(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return RoleKey::Custom;
        };
        TENANT_ROLE_KEYS
            .iter()
            .copied()
            .find(|key| key.as_str() == name)
            .unwrap_or(RoleKey::Custom)
    }
}

impl core::fmt::Display for RoleKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleScope {
    Global,
    #[default]
    Org,
}

/// Static description of a built-in role.
#[derive(Debug, Clone, Copy)]
pub struct RoleTemplate {
    pub key: RoleKey,
    pub name: &'static str,
    pub description: &'static str,
    pub scope: RoleScope,
    /// Statements granted directly by this template (not including inherited ones).
    pub permissions: &'static [(&'static str, &'static [&'static str])],
    /// Template names this role inherits from.
    pub inherits: &'static [&'static str],
    pub is_system: bool,
    pub is_default: bool,
}

impl RoleTemplate {
    pub fn permission_map(&self) -> PermissionMap {
        PermissionMap::from_statements(self.permissions)
    }
}

/// Template roles synced into every organization, in bootstrap order.
pub const TENANT_ROLE_KEYS: &[RoleKey] = &[
    RoleKey::Owner,
    RoleKey::OrgAdmin,
    RoleKey::HrAdmin,
    RoleKey::Manager,
    RoleKey::Compliance,
    RoleKey::Member,
];

pub const ROLE_TEMPLATES: &[RoleTemplate] = &[
    RoleTemplate {
        key: RoleKey::Owner,
        name: "owner",
        description: "Organization owner with full governance rights",
        scope: RoleScope::Org,
        permissions: &[
            ("organization", &["read", "update", "delete", "governance"]),
            ("billing", &["read", "update"]),
            ("audit", &["read", "write"]),
            ("residency", &["read", "enforce"]),
            ("pii", &["read", "write", "delete", "process"]),
        ],
        inherits: &["orgAdmin"],
        is_system: true,
        is_default: false,
    },
    RoleTemplate {
        key: RoleKey::OrgAdmin,
        name: "orgAdmin",
        description: "Administers members, invitations and settings",
        scope: RoleScope::Org,
        permissions: &[
            ("organization", &["read", "update"]),
            ("member", &["read", "invite", "update", "remove"]),
            ("invitation", &["read", "create", "cancel"]),
            ("settings", &["read", "update"]),
            ("org.abac.policy", &["read", "update"]),
            ("org.role", &["read", "create", "update"]),
            ("audit", &["read"]),
            ("billing", &["read"]),
        ],
        inherits: &["hrAdmin"],
        is_system: true,
        is_default: false,
    },
    RoleTemplate {
        key: RoleKey::HrAdmin,
        name: "hrAdmin",
        description: "Manages people records, contracts and onboarding",
        scope: RoleScope::Org,
        permissions: &[
            ("hr.people.profile", &["read", "create", "update", "delete"]),
            ("hr.people.contract", &["read", "create", "update", "delete"]),
            ("hr.onboarding", &["read", "create", "update", "apply"]),
            ("hr.compliance", &["read", "update"]),
            ("hr.policy", &["update"]),
            ("pii", &["read", "write", "process"]),
        ],
        inherits: &["manager"],
        is_system: true,
        is_default: false,
    },
    RoleTemplate {
        key: RoleKey::Manager,
        name: "manager",
        description: "Approves leave and time for direct reports",
        scope: RoleScope::Org,
        permissions: &[
            ("member", &["read"]),
            ("hr.leave.request", &["approve"]),
            ("hr.absence", &["update", "acknowledge"]),
            ("hr.time-entry", &["approve"]),
            ("hr.training", &["assign"]),
        ],
        inherits: &["member"],
        is_system: true,
        is_default: false,
    },
    RoleTemplate {
        key: RoleKey::Compliance,
        name: "compliance",
        description: "Reviews compliance items and residency controls",
        scope: RoleScope::Org,
        permissions: &[
            ("hr.compliance", &["read", "update", "review"]),
            ("hr.policy", &["update"]),
            ("audit", &["read"]),
            ("residency", &["read", "enforce"]),
        ],
        inherits: &["member"],
        is_system: true,
        is_default: false,
    },
    RoleTemplate {
        key: RoleKey::Member,
        name: "member",
        description: "Standard organization member",
        scope: RoleScope::Org,
        permissions: &[
            ("organization", &["read"]),
            ("hr.people.profile", &["read"]),
            ("hr.leave.request", &["read", "create", "cancel"]),
            ("hr.absence", &["read", "create"]),
            ("hr.onboarding", &["read"]),
            ("hr.policy", &["read", "acknowledge"]),
            ("hr.training", &["read", "complete"]),
            ("hr.time-entry", &["read", "create"]),
        ],
        inherits: &[],
        is_system: true,
        is_default: true,
    },
];

pub fn role_template(key: RoleKey) -> Option<&'static RoleTemplate> {
    ROLE_TEMPLATES.iter().find(|t| t.key == key)
}

pub fn role_template_by_name(name: &str) -> Option<&'static RoleTemplate> {
    ROLE_TEMPLATES.iter().find(|t| t.name == name)
}

/// Resolve a template's permissions through its inheritance graph.
///
/// Cycles are cut: each template contributes at most once.
pub fn flatten_template_permissions(key: RoleKey) -> PermissionMap {
    let mut permissions = PermissionMap::new();
    let mut visited: BTreeSet<&'static str> = BTreeSet::new();
    let mut pending: Vec<&'static RoleTemplate> = role_template(key).into_iter().collect();

    while let Some(template) = pending.pop() {
        if !visited.insert(template.name) {
            continue;
        }
        permissions.merge(&template.permission_map());
        pending.extend(template.inherits.iter().filter_map(|n| role_template_by_name(n)));
    }

    permissions
}

// ─────────────────────────────────────────────────────────────────────────────
// Persisted roles
// ─────────────────────────────────────────────────────────────────────────────

/// A concrete role row in one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub org_id: OrgId,
    pub name: String,
    pub description: Option<String>,
    pub scope: RoleScope,
    pub permissions: PermissionMap,
    pub inherits_role_ids: Vec<RoleId>,
    pub is_system: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantScoped for Role {
    fn org_id(&self) -> Option<&OrgId> {
        Some(&self.org_id)
    }
}

/// Fields for creating a role row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub scope: RoleScope,
    pub permissions: PermissionMap,
    pub inherits_role_ids: Vec<RoleId>,
    pub is_system: bool,
    pub is_default: bool,
}

impl NewRole {
    pub fn from_template(template: &RoleTemplate) -> Self {
        Self {
            name: template.name.to_string(),
            description: Some(template.description.to_string()),
            scope: template.scope,
            permissions: template.permission_map(),
            inherits_role_ids: Vec::new(),
            is_system: template.is_system,
            is_default: template.is_default,
        }
    }
}

/// Partial update of a role row. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub description: Option<String>,
    pub scope: Option<RoleScope>,
    pub permissions: Option<PermissionMap>,
    pub inherits_role_ids: Option<Vec<RoleId>>,
    pub is_system: Option<bool>,
    pub is_default: Option<bool>,
}

impl RoleUpdate {
    pub fn apply_to(self, role: &mut Role) {
        if let Some(description) = self.description {
            role.description = Some(description);
        }
        if let Some(scope) = self.scope {
            role.scope = scope;
        }
        if let Some(permissions) = self.permissions {
            role.permissions = permissions;
        }
        if let Some(ids) = self.inherits_role_ids {
            role.inherits_role_ids = ids;
        }
        if let Some(is_system) = self.is_system {
            role.is_system = is_system;
        }
        if let Some(is_default) = self.is_default {
            role.is_default = is_default;
        }
    }

    /// Drift-correction update: every template-owned field.
    pub fn sync_from_template(template: &RoleTemplate) -> Self {
        Self {
            description: Some(template.description.to_string()),
            scope: Some(template.scope),
            permissions: Some(template.permission_map()),
            inherits_role_ids: None,
            is_system: Some(template.is_system),
            is_default: Some(template.is_default),
        }
    }
}

/// Does `role` differ from `template` in any template-owned field?
///
/// Permission comparison is order-independent.
pub fn role_drifted_from_template(role: &Role, template: &RoleTemplate) -> bool {
    role.permissions != template.permission_map()
        || role.description.as_deref() != Some(template.description)
        || role.scope != template.scope
        || role.is_default != template.is_default
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::action_known;

    #[test]
    fn every_tenant_key_has_a_template() {
        for key in TENANT_ROLE_KEYS {
            let template = role_template(*key).expect("template");
            assert_eq!(template.key, *key);
            assert_eq!(RoleKey::from_role_name(Some(template.name)), *key);
        }
    }

    #[test]
    fn templates_only_use_registry_permissions() {
        for template in ROLE_TEMPLATES {
            for (resource, action) in template.permission_map().iter() {
                assert!(
                    action_known(resource, action),
                    "{} grants unknown {resource}:{action}",
                    template.name
                );
            }
            for parent in template.inherits {
                assert!(role_template_by_name(parent).is_some(), "{parent} missing");
            }
        }
    }

    #[test]
    fn inheritance_is_flattened() {
        let owner = flatten_template_permissions(RoleKey::Owner);
        assert!(owner.grants("organization", "governance"));
        assert!(owner.grants("member", "invite"));
        assert!(owner.grants("hr.people.contract", "delete"));
        assert!(owner.grants("hr.leave.request", "approve"));
        assert!(owner.grants("hr.policy", "acknowledge"));

        let member = flatten_template_permissions(RoleKey::Member);
        assert!(member.grants("organization", "read"));
        assert!(!member.grants("organization", "update"));
    }

    #[test]
    fn unknown_role_names_are_custom() {
        assert_eq!(RoleKey::from_role_name(Some("Finance Analyst")), RoleKey::Custom);
        assert_eq!(RoleKey::from_role_name(None), RoleKey::Custom);
        assert_eq!(flatten_template_permissions(RoleKey::Custom), PermissionMap::new());
    }

    #[test]
    fn drift_detection_ignores_action_order() {
        let template = role_template(RoleKey::Member).unwrap();
        let now = Utc::now();
        let mut role = Role {
            id: RoleId::new("role-1"),
            org_id: OrgId::new("org-1"),
            name: template.name.to_string(),
            description: Some(template.description.to_string()),
            scope: template.scope,
            permissions: template.permission_map(),
            inherits_role_ids: vec![],
            is_system: true,
            is_default: true,
            created_at: now,
            updated_at: now,
        };
        assert!(!role_drifted_from_template(&role, template));

        role.permissions.grant("billing", "update");
        assert!(role_drifted_from_template(&role, template));
    }
}
