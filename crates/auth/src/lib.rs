//! `orgcentral-auth` — tenant-scoped authorization core.
//!
//! Pure logic only: no HTTP, no storage, no clock reads outside the context
//! builder. Collaborators (repositories, session store, audit) live in
//! `orgcentral-infra` and call into this crate.

pub mod abac;
pub mod authorize;
pub mod cache;
pub mod context;
pub mod guard;
pub mod membership;
pub mod permissions;
pub mod policies;
pub mod roles;
pub mod session;

pub use authorize::{
    AccessGrant, AuthorizationExplanation, GrantSource, OrgAccessRequest, RoleCheck,
    enforce_permission, ensure_org_access, explain_authorization,
};
pub use cache::{CacheMode, CacheSafeAuthorizationContext, cache_mode_for, to_cache_safe_authorization_context};
pub use context::{AuthorizationContextBuilder, RepositoryAuthorizationContext};
pub use guard::{GuardViolation, SecurityEvent, TenantAccessGuard, WriteOperation, assert_tenant_record};
pub use membership::{MembershipRecord, MembershipStatus, OrganizationSummary, check_membership_status};
pub use permissions::{
    PermissionMap, PermissionRegistry, PermissionResource, ROLE_PERMISSION_STATEMENTS, action_known,
    resource_known, validate_role_permissions,
};
pub use policies::{SecurityPolicies, SecurityPolicyOverrides, resolve_security_policies};
pub use roles::{NewRole, Role, RoleKey, RoleScope, RoleTemplate, RoleUpdate, flatten_template_permissions};
pub use session::{OrgSecuritySettings, SessionRecord, enforce_org_session_security};
