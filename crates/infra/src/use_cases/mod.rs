//! Application operations composed from the auth core and the repositories.

pub mod abac_policies;
pub mod bootstrap;
pub mod hr_profiles;
pub mod membership;
pub mod roles;
pub mod session_context;

pub use abac_policies::{AbacPolicyDeps, get_abac_policies, set_abac_policies};
pub use bootstrap::{ensure_abac_policies, ensure_builtin_roles};
pub use hr_profiles::{EmployeeProfile, HrProfileDeps, get_employee_profile_cached};
pub use membership::require_active_membership;
pub use roles::{RoleAdminDeps, RoleDefinition, RoleDefinitionPatch, create_role, list_roles, update_role};
pub use session_context::{
    RedirectOptions, SessionAccessRequest, SessionContext, SessionDeps, SessionRedirect,
    SessionResolution, get_session_context, get_session_context_or_redirect,
};
