//! Cached HR profile reads.
//!
//! The permission gate runs first, then the cache wrapper, then the guarded
//! repository. A cache hit is re-checked against the guard so a stale entry
//! can never leak across a classification change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use orgcentral_auth::{OrgAccessRequest, RepositoryAuthorizationContext, TenantAccessGuard};
use orgcentral_core::{
    DataClassification, DataResidency, DomainError, DomainResult, Entity, OrgId, TenantScoped,
    UserId,
};

use crate::audit::{AuditEvent, AuditLogger, record_best_effort};
use crate::cache::{CACHE_SCOPE_HR_PROFILES, OrgCache};
use crate::repositories::{InMemoryRecordStore, RecordStore, TenantScopedRepository};
use crate::services::AuthorizationService;

pub const HR_PROFILE_RESOURCE: &str = "hr.people.profile";
pub const HR_PROFILE_READ_AUDIT_ACTION: &str = "hr.profile.read";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    pub id: String,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub display_name: String,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub data_classification: DataClassification,
    pub data_residency: DataResidency,
}

impl Entity for EmployeeProfile {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

impl TenantScoped for EmployeeProfile {
    fn org_id(&self) -> Option<&OrgId> {
        Some(&self.org_id)
    }

    fn data_classification(&self) -> Option<DataClassification> {
        Some(self.data_classification)
    }

    fn data_residency(&self) -> Option<DataResidency> {
        Some(self.data_residency)
    }
}

pub type ProfileStore = Arc<dyn RecordStore<EmployeeProfile>>;
pub type ProfileRepository = TenantScopedRepository<EmployeeProfile, ProfileStore>;

/// A guarded profile repository over an in-memory store. Writes clear the
/// cached profile reads of the writer's org.
pub fn in_memory_profile_repository(
    audit: Arc<dyn AuditLogger>,
    cache: Arc<OrgCache>,
) -> (ProfileRepository, Arc<InMemoryRecordStore<EmployeeProfile>>) {
    let store = Arc::new(InMemoryRecordStore::new());
    let repo = TenantScopedRepository::new(store.clone() as ProfileStore, audit, HR_PROFILE_RESOURCE)
        .invalidating(cache, CACHE_SCOPE_HR_PROFILES);
    (repo, store)
}

#[derive(Clone)]
pub struct HrProfileDeps {
    pub profiles: Arc<ProfileRepository>,
    pub authorization: Arc<AuthorizationService>,
    pub cache: Arc<OrgCache>,
    pub audit: Arc<dyn AuditLogger>,
}

#[tracing::instrument(level = "debug", skip(deps, ctx), fields(org_id = %ctx.org_id()))]
pub async fn get_employee_profile_cached(
    deps: &HrProfileDeps,
    ctx: &RepositoryAuthorizationContext,
    profile_id: &str,
) -> DomainResult<EmployeeProfile> {
    let request = OrgAccessRequest::new().requiring(HR_PROFILE_RESOURCE, "read");
    deps.authorization.authorize(ctx, &request).await?;

    let profiles = deps.profiles.as_ref();
    let id = profile_id.to_string();
    let outcome = deps
        .cache
        .cached_read(ctx, &[CACHE_SCOPE_HR_PROFILES], profile_id, move || async move {
            profiles.find_by_id(ctx, &id).await
        })
        .await
        .and_then(|read| {
            TenantAccessGuard
                .assert_readable(&read.value, ctx, HR_PROFILE_RESOURCE)
                .map_err(DomainError::from)?;
            Ok(read)
        });

    let (cache_mode, result_label) = match &outcome {
        Ok(read) => (Some(read.mode.as_str()), "success"),
        Err(DomainError::Authorization(_)) => (None, "denied"),
        Err(_) => (None, "error"),
    };
    record_best_effort(
        deps.audit.as_ref(),
        AuditEvent::from_context(
            ctx,
            HR_PROFILE_READ_AUDIT_ACTION,
            HR_PROFILE_RESOURCE,
            json!({
                "profileId": profile_id,
                "cacheMode": cache_mode,
                "outcome": result_label,
            }),
        ),
    )
    .await;

    outcome.map(|read| read.value)
}
