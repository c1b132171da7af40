//! In-memory repositories for tests and the dev server.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use orgcentral_auth::abac::AbacPolicy;
use orgcentral_auth::{
    MembershipRecord, NewRole, OrganizationSummary, PermissionResource, Role, RoleUpdate,
    SessionRecord,
};
use orgcentral_core::{DomainError, DomainResult, OrgId, RoleId, UserId};

use super::{
    AbacPolicyRepository, MembershipRepository, OrganizationRepository,
    PermissionResourceRepository, RoleRepository, SessionLookup,
};

fn poisoned() -> DomainError {
    DomainError::repository("lock poisoned")
}

#[derive(Debug, Default)]
pub struct InMemoryRoleRepository {
    roles: RwLock<HashMap<OrgId, Vec<Role>>>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn get_roles_by_organization(&self, org_id: &OrgId) -> DomainResult<Vec<Role>> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(roles.get(org_id).cloned().unwrap_or_default())
    }

    async fn get_role(&self, org_id: &OrgId, role_id: &RoleId) -> DomainResult<Option<Role>> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(roles
            .get(org_id)
            .and_then(|rows| rows.iter().find(|r| &r.id == role_id))
            .cloned())
    }

    async fn get_role_by_name(&self, org_id: &OrgId, name: &str) -> DomainResult<Option<Role>> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(roles
            .get(org_id)
            .and_then(|rows| rows.iter().find(|r| r.name == name))
            .cloned())
    }

    async fn create_role(&self, org_id: &OrgId, role: NewRole) -> DomainResult<Role> {
        let mut roles = self.roles.write().map_err(|_| poisoned())?;
        let rows = roles.entry(org_id.clone()).or_default();
        if rows.iter().any(|r| r.name == role.name) {
            return Err(DomainError::conflict(format!(
                "Role \"{}\" already exists in this organization.",
                role.name
            )));
        }

        let now = Utc::now();
        let created = Role {
            id: RoleId::generate(),
            org_id: org_id.clone(),
            name: role.name,
            description: role.description,
            scope: role.scope,
            permissions: role.permissions,
            inherits_role_ids: role.inherits_role_ids,
            is_system: role.is_system,
            is_default: role.is_default,
            created_at: now,
            updated_at: now,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn update_role(
        &self,
        org_id: &OrgId,
        role_id: &RoleId,
        update: RoleUpdate,
    ) -> DomainResult<Role> {
        let mut roles = self.roles.write().map_err(|_| poisoned())?;
        let role = roles
            .get_mut(org_id)
            .and_then(|rows| rows.iter_mut().find(|r| &r.id == role_id))
            .ok_or_else(|| DomainError::not_found("Role"))?;
        update.apply_to(role);
        role.updated_at = Utc::now();
        Ok(role.clone())
    }
}

/// Last write wins; no versioning.
#[derive(Debug, Default)]
pub struct InMemoryAbacPolicyRepository {
    policies: RwLock<HashMap<OrgId, Vec<AbacPolicy>>>,
}

impl InMemoryAbacPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AbacPolicyRepository for InMemoryAbacPolicyRepository {
    async fn get_policies_for_org(&self, org_id: &OrgId) -> DomainResult<Vec<AbacPolicy>> {
        let policies = self.policies.read().map_err(|_| poisoned())?;
        Ok(policies.get(org_id).cloned().unwrap_or_default())
    }

    async fn set_policies_for_org(
        &self,
        org_id: &OrgId,
        policies: Vec<AbacPolicy>,
    ) -> DomainResult<Vec<AbacPolicy>> {
        let mut stored = self.policies.write().map_err(|_| poisoned())?;
        stored.insert(org_id.clone(), policies.clone());
        Ok(policies)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPermissionResourceRepository {
    resources: RwLock<Vec<PermissionResource>>,
}

impl InMemoryPermissionResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: PermissionResource) {
        if let Ok(mut resources) = self.resources.write() {
            resources.push(resource);
        }
    }
}

#[async_trait::async_trait]
impl PermissionResourceRepository for InMemoryPermissionResourceRepository {
    async fn list_resources(&self, org_id: &OrgId) -> DomainResult<Vec<PermissionResource>> {
        let resources = self.resources.read().map_err(|_| poisoned())?;
        Ok(resources
            .iter()
            .filter(|r| &r.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMembershipRepository {
    memberships: RwLock<HashMap<(OrgId, UserId), MembershipRecord>>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, membership: MembershipRecord) {
        if let Ok(mut memberships) = self.memberships.write() {
            memberships.insert(
                (membership.org_id.clone(), membership.user_id.clone()),
                membership,
            );
        }
    }
}

#[async_trait::async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn find_membership(
        &self,
        org_id: &OrgId,
        user_id: &UserId,
    ) -> DomainResult<Option<MembershipRecord>> {
        let memberships = self.memberships.read().map_err(|_| poisoned())?;
        Ok(memberships.get(&(org_id.clone(), user_id.clone())).cloned())
    }

    async fn list_memberships_for_user(&self, user_id: &UserId) -> DomainResult<Vec<MembershipRecord>> {
        let memberships = self.memberships.read().map_err(|_| poisoned())?;
        let mut found: Vec<MembershipRecord> = memberships
            .values()
            .filter(|m| &m.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.org_id.cmp(&b.org_id));
        Ok(found)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrganizationRepository {
    organizations: RwLock<HashMap<OrgId, OrganizationSummary>>,
}

impl InMemoryOrganizationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, organization: OrganizationSummary) {
        if let Ok(mut organizations) = self.organizations.write() {
            organizations.insert(organization.id.clone(), organization);
        }
    }
}

#[async_trait::async_trait]
impl OrganizationRepository for InMemoryOrganizationRepository {
    async fn find_by_slug(&self, slug: &str) -> DomainResult<Option<OrganizationSummary>> {
        let organizations = self.organizations.read().map_err(|_| poisoned())?;
        Ok(organizations.values().find(|o| o.slug == slug).cloned())
    }

    async fn find_by_id(&self, org_id: &OrgId) -> DomainResult<Option<OrganizationSummary>> {
        let organizations = self.organizations.read().map_err(|_| poisoned())?;
        Ok(organizations.get(org_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: SessionRecord) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session.token.clone(), session);
        }
    }
}

#[async_trait::async_trait]
impl SessionLookup for InMemorySessionStore {
    async fn get_session(&self, token: &str) -> DomainResult<Option<SessionRecord>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgcentral_auth::abac::AbacEffect;
    use orgcentral_auth::roles::{RoleKey, role_template};

    #[tokio::test]
    async fn roles_are_isolated_per_org_and_names_are_unique() {
        let repo = InMemoryRoleRepository::new();
        let template = role_template(RoleKey::Member).unwrap();
        let org_a = OrgId::new("org-a");
        let org_b = OrgId::new("org-b");

        let created = repo.create_role(&org_a, NewRole::from_template(template)).await.unwrap();
        repo.create_role(&org_b, NewRole::from_template(template)).await.unwrap();

        let err = repo
            .create_role(&org_a, NewRole::from_template(template))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        assert!(repo.get_role(&org_b, &created.id).await.unwrap().is_none());
        assert_eq!(repo.get_roles_by_organization(&org_a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn updating_a_role_in_another_org_is_not_found() {
        let repo = InMemoryRoleRepository::new();
        let template = role_template(RoleKey::Manager).unwrap();
        let created = repo
            .create_role(&OrgId::new("org-a"), NewRole::from_template(template))
            .await
            .unwrap();

        let err = repo
            .update_role(&OrgId::new("org-b"), &created.id, RoleUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("Role"));
    }

    #[tokio::test]
    async fn policy_writes_replace_the_whole_set() {
        let repo = InMemoryAbacPolicyRepository::new();
        let org = OrgId::new("org-1");
        let first = vec![
            AbacPolicy::new("a", AbacEffect::Allow, &["*"], &["*"]),
            AbacPolicy::new("b", AbacEffect::Deny, &["*"], &["*"]),
        ];
        repo.set_policies_for_org(&org, first).await.unwrap();
        repo.set_policies_for_org(&org, vec![AbacPolicy::new("c", AbacEffect::Allow, &["*"], &["*"])])
            .await
            .unwrap();

        let stored = repo.get_policies_for_org(&org).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id.as_str(), "c");
        assert!(repo.get_policies_for_org(&OrgId::new("org-2")).await.unwrap().is_empty());
    }
}
