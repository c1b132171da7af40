//! Repository contracts consumed by the use cases.
//!
//! Every call is org-scoped: implementations must never return a row owned by
//! a different organization than the one passed in.

pub mod in_memory;
pub mod scoped;

use orgcentral_auth::abac::AbacPolicy;
use orgcentral_auth::{
    MembershipRecord, NewRole, OrganizationSummary, PermissionResource, Role, RoleUpdate,
    SessionRecord,
};
use orgcentral_core::{DomainResult, OrgId, RoleId, UserId};

pub use in_memory::{
    InMemoryAbacPolicyRepository, InMemoryMembershipRepository, InMemoryOrganizationRepository,
    InMemoryPermissionResourceRepository, InMemoryRoleRepository, InMemorySessionStore,
};
pub use scoped::{InMemoryRecordStore, RecordStore, TenantScopedRepository};

#[async_trait::async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get_roles_by_organization(&self, org_id: &OrgId) -> DomainResult<Vec<Role>>;

    async fn get_role(&self, org_id: &OrgId, role_id: &RoleId) -> DomainResult<Option<Role>>;

    async fn get_role_by_name(&self, org_id: &OrgId, name: &str) -> DomainResult<Option<Role>>;

    async fn create_role(&self, org_id: &OrgId, role: NewRole) -> DomainResult<Role>;

    async fn update_role(
        &self,
        org_id: &OrgId,
        role_id: &RoleId,
        update: RoleUpdate,
    ) -> DomainResult<Role>;
}

/// Per-org ABAC policy storage. Writes replace the whole set.
#[async_trait::async_trait]
pub trait AbacPolicyRepository: Send + Sync {
    async fn get_policies_for_org(&self, org_id: &OrgId) -> DomainResult<Vec<AbacPolicy>>;

    async fn set_policies_for_org(
        &self,
        org_id: &OrgId,
        policies: Vec<AbacPolicy>,
    ) -> DomainResult<Vec<AbacPolicy>>;
}

/// Org-defined permission resources.
#[async_trait::async_trait]
pub trait PermissionResourceRepository: Send + Sync {
    async fn list_resources(&self, org_id: &OrgId) -> DomainResult<Vec<PermissionResource>>;
}

#[async_trait::async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find_membership(
        &self,
        org_id: &OrgId,
        user_id: &UserId,
    ) -> DomainResult<Option<MembershipRecord>>;

    async fn list_memberships_for_user(&self, user_id: &UserId) -> DomainResult<Vec<MembershipRecord>>;
}

#[async_trait::async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> DomainResult<Option<OrganizationSummary>>;

    async fn find_by_id(&self, org_id: &OrgId) -> DomainResult<Option<OrganizationSummary>>;
}

/// Session store lookup by bearer token.
#[async_trait::async_trait]
pub trait SessionLookup: Send + Sync {
    async fn get_session(&self, token: &str) -> DomainResult<Option<SessionRecord>>;
}
