//! Role permission registry: which actions exist on which resources.
//!
//! `ROLE_PERMISSION_STATEMENTS` is the ground truth for built-in resources.
//! Organizations extend it at runtime with [`PermissionResource`] rows; the
//! combined view is a [`PermissionRegistry`], used to validate role
//! definitions before they are persisted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orgcentral_core::{DomainError, DomainResult, OrgId, TenantScoped};

/// Built-in resource → allowed actions.
pub const ROLE_PERMISSION_STATEMENTS: &[(&str, &[&str])] = &[
    ("organization", &["read", "update", "delete", "governance"]),
    ("member", &["read", "invite", "update", "remove"]),
    ("invitation", &["read", "create", "cancel"]),
    ("settings", &["read", "update"]),
    ("audit", &["read", "write"]),
    ("residency", &["read", "enforce"]),
    ("billing", &["read", "update"]),
    ("pii", &["read", "write", "delete", "process"]),
    ("org.abac.policy", &["read", "update"]),
    ("org.role", &["read", "create", "update"]),
    ("hr.people.profile", &["read", "create", "update", "delete"]),
    ("hr.people.contract", &["read", "create", "update", "delete"]),
    ("hr.leave.request", &["read", "create", "approve", "cancel"]),
    ("hr.absence", &["read", "create", "update", "acknowledge"]),
    ("hr.onboarding", &["read", "create", "update", "apply"]),
    ("hr.compliance", &["read", "update", "review"]),
    ("hr.training", &["read", "assign", "complete"]),
    ("hr.policy", &["read", "acknowledge", "update"]),
    ("hr.time-entry", &["read", "create", "approve"]),
];

/// Is `resource` a built-in resource?
pub fn resource_known(resource: &str) -> bool {
    ROLE_PERMISSION_STATEMENTS.iter().any(|(r, _)| *r == resource)
}

/// Is `action` a built-in action on `resource`?
pub fn action_known(resource: &str, action: &str) -> bool {
    ROLE_PERMISSION_STATEMENTS
        .iter()
        .find(|(r, _)| *r == resource)
        .is_some_and(|(_, actions)| actions.contains(&action))
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission map
// ─────────────────────────────────────────────────────────────────────────────

/// Resource name → ordered set of allowed actions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<String, BTreeSet<String>>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_statements(statements: &[(&str, &[&str])]) -> Self {
        let mut map = Self::new();
        for (resource, actions) in statements {
            for action in *actions {
                map.grant(*resource, *action);
            }
        }
        map
    }

    /// Shorthand for a single-resource requirement, e.g. `{ organization: [update] }`.
    pub fn single(resource: impl Into<String>, action: impl Into<String>) -> Self {
        let mut map = Self::new();
        map.grant(resource, action);
        map
    }

    pub fn grant(&mut self, resource: impl Into<String>, action: impl Into<String>) {
        self.0
            .entry(resource.into())
            .or_default()
            .insert(action.into());
    }

    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.0
            .get(resource)
            .is_some_and(|actions| actions.contains(action))
    }

    /// Does `self` contain every `(resource, action)` pair in `required`?
    pub fn satisfies(&self, required: &PermissionMap) -> bool {
        required
            .iter()
            .all(|(resource, action)| self.grants(resource, action))
    }

    /// At least one of `profiles` must be satisfied. An empty list is trivially satisfied.
    pub fn satisfies_any(&self, profiles: &[PermissionMap]) -> bool {
        profiles.is_empty() || profiles.iter().any(|profile| self.satisfies(profile))
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, other: &PermissionMap) {
        for (resource, action) in other.iter() {
            self.grant(resource, action);
        }
    }

    /// Does any resource grant `action`?
    pub fn grants_action_anywhere(&self, action: &str) -> bool {
        self.0.values().any(|actions| actions.contains(action))
    }

    /// Flattened `(resource, action)` pairs in resource, then action order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(resource, actions)| {
            actions
                .iter()
                .map(move |action| (resource.as_str(), action.as_str()))
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn actions(&self, resource: &str) -> Option<&BTreeSet<String>> {
        self.0.get(resource)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

impl FromIterator<(String, String)> for PermissionMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (resource, action) in iter {
            map.grant(resource, action);
        }
        map
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Org-defined resources
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata attached to an org-defined resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResourceMetadata {
    /// Former names still accepted in role definitions.
    #[serde(default)]
    pub legacy_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A custom, tenant-defined resource beyond the static registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResource {
    pub id: String,
    pub org_id: OrgId,
    pub resource: String,
    pub actions: Vec<String>,
    #[serde(default)]
    pub metadata: PermissionResourceMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantScoped for PermissionResource {
    fn org_id(&self) -> Option<&OrgId> {
        Some(&self.org_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Static statements plus an org's custom resources, with legacy aliases.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    resource_actions: BTreeMap<String, BTreeSet<String>>,
    aliases: BTreeMap<String, String>,
}

impl PermissionRegistry {
    pub fn builtin() -> Self {
        Self::build(&[])
    }

    pub fn build(resources: &[PermissionResource]) -> Self {
        let mut registry = Self::default();

        for (resource, actions) in ROLE_PERMISSION_STATEMENTS {
            registry.register(resource, actions.iter().copied());
        }

        for resource in resources {
            registry.register(&resource.resource, resource.actions.iter().map(String::as_str));
            let canonical = resource.resource.trim();
            for alias in &resource.metadata.legacy_keys {
                let alias = alias.trim();
                if alias.is_empty() || canonical.is_empty() {
                    continue;
                }
                registry
                    .aliases
                    .entry(alias.to_string())
                    .or_insert_with(|| canonical.to_string());
            }
        }

        registry
    }

    fn register<'a>(&mut self, resource: &str, actions: impl Iterator<Item = &'a str>) {
        let resource = resource.trim();
        if resource.is_empty() {
            return;
        }
        let entry = self.resource_actions.entry(resource.to_string()).or_default();
        for action in actions {
            let action = action.trim();
            if !action.is_empty() {
                entry.insert(action.to_string());
            }
        }
        self.aliases
            .insert(resource.to_string(), resource.to_string());
    }

    /// Resolve a resource name (or legacy alias) to its canonical name.
    pub fn canonical_resource(&self, resource: &str) -> Option<&str> {
        self.aliases.get(resource).map(String::as_str)
    }

    pub fn allowed_actions(&self, resource: &str) -> Option<&BTreeSet<String>> {
        self.resource_actions.get(resource)
    }

    /// Every `(resource, actions)` entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.resource_actions
            .iter()
            .map(|(resource, actions)| (resource.as_str(), actions))
    }
}

/// Validate a role's requested permissions against the org registry.
///
/// Resource names are trimmed and legacy aliases canonicalized; actions are
/// trimmed, de-duplicated and sorted. Any unknown resource or action rejects
/// the whole definition.
pub fn validate_role_permissions(
    registry: &PermissionRegistry,
    permissions: &BTreeMap<String, Vec<String>>,
) -> DomainResult<PermissionMap> {
    let mut normalized = PermissionMap::new();

    for (raw_resource, raw_actions) in permissions {
        let resource = raw_resource.trim();
        if resource.is_empty() {
            return Err(DomainError::validation(
                "Permission resource name cannot be empty.",
            ));
        }

        let canonical = registry.canonical_resource(resource).unwrap_or(resource);
        let Some(allowed) = registry.allowed_actions(canonical) else {
            return Err(DomainError::validation(format!(
                "Unknown permission resource \"{resource}\"."
            )));
        };

        let mut accepted = 0usize;
        for raw_action in raw_actions {
            let action = raw_action.trim();
            if action.is_empty() {
                continue;
            }
            if !allowed.contains(action) {
                return Err(DomainError::validation(format!(
                    "Action \"{action}\" is not allowed for permission resource \"{canonical}\"."
                )));
            }
            normalized.grant(canonical, action);
            accepted += 1;
        }

        if accepted == 0 {
            return Err(DomainError::validation(format!(
                "Permission actions for \"{canonical}\" are required."
            )));
        }
    }

    Ok(normalized)
}
