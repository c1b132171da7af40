//! Service wiring: in-memory repositories, the org cache, the audit sink and
//! the use-case dependency bundles handed to the routes.

use std::sync::Arc;

use chrono::Duration;

use orgcentral_auth::{
    MembershipRecord, MembershipStatus, OrgSecuritySettings, OrganizationSummary, SessionRecord,
    resolve_security_policies,
};
use orgcentral_core::{DataClassification, DataResidency, DomainResult, OrgId, UserId};
use orgcentral_infra::audit::{
    AuditFanOut, AuditLogger, InMemoryAuditLog, RedactingAuditLogger, TracingAuditLogger,
};
use orgcentral_infra::cache::OrgCache;
use orgcentral_infra::clock::Clock;
use orgcentral_infra::repositories::{
    InMemoryAbacPolicyRepository, InMemoryMembershipRepository, InMemoryOrganizationRepository,
    InMemoryPermissionResourceRepository, InMemoryRecordStore, InMemoryRoleRepository,
    InMemorySessionStore, RecordStore,
};
use orgcentral_infra::services::AuthorizationService;
use orgcentral_infra::use_cases::hr_profiles::in_memory_profile_repository;
use orgcentral_infra::use_cases::{
    AbacPolicyDeps, EmployeeProfile, HrProfileDeps, RoleAdminDeps, SessionDeps,
    ensure_abac_policies, ensure_builtin_roles,
};

use crate::config::ApiConfig;

/// Handles to the backing stores, for seeding and inspection.
#[derive(Clone)]
pub struct InMemoryStores {
    pub sessions: Arc<InMemorySessionStore>,
    pub organizations: Arc<InMemoryOrganizationRepository>,
    pub memberships: Arc<InMemoryMembershipRepository>,
    pub roles: Arc<InMemoryRoleRepository>,
    pub policies: Arc<InMemoryAbacPolicyRepository>,
    pub resources: Arc<InMemoryPermissionResourceRepository>,
    pub profiles: Arc<InMemoryRecordStore<EmployeeProfile>>,
    /// Present only when `audit_buffer_capacity` is non-zero.
    pub audit_log: Option<Arc<InMemoryAuditLog>>,
}

#[derive(Clone)]
pub struct AppServices {
    pub config: ApiConfig,
    pub stores: InMemoryStores,
    pub cache: Arc<OrgCache>,
    pub authorization: Arc<AuthorizationService>,
    pub session: SessionDeps,
    pub abac: AbacPolicyDeps,
    pub roles: RoleAdminDeps,
    pub profiles: HrProfileDeps,
}

pub fn build_services(config: ApiConfig, clock: Arc<dyn Clock>) -> AppServices {
    let security = resolve_security_policies(config.security.clone());

    let audit_log = (config.audit_buffer_capacity > 0)
        .then(|| Arc::new(InMemoryAuditLog::with_capacity(config.audit_buffer_capacity)));
    let mut sinks: Vec<Arc<dyn AuditLogger>> = vec![Arc::new(TracingAuditLogger)];
    if let Some(log) = &audit_log {
        sinks.push(log.clone());
    }
    let audit: Arc<dyn AuditLogger> = Arc::new(RedactingAuditLogger::new(
        Arc::new(AuditFanOut::new(sinks)),
        security.audit.redact_sensitive_fields.clone(),
    ));

    let cache = Arc::new(
        OrgCache::new(clock.clone(), Duration::seconds(config.cache_ttl_seconds))
            .with_max_entries(config.cache_max_entries),
    );

    let (profile_repo, profile_store) = in_memory_profile_repository(audit.clone(), cache.clone());
    let stores = InMemoryStores {
        sessions: Arc::new(InMemorySessionStore::new()),
        organizations: Arc::new(InMemoryOrganizationRepository::new()),
        memberships: Arc::new(InMemoryMembershipRepository::new()),
        roles: Arc::new(InMemoryRoleRepository::new()),
        policies: Arc::new(InMemoryAbacPolicyRepository::new()),
        resources: Arc::new(InMemoryPermissionResourceRepository::new()),
        profiles: profile_store,
        audit_log,
    };

    let authorization = Arc::new(AuthorizationService::new(
        stores.policies.clone(),
        cache.clone(),
        audit.clone(),
        security,
    ));

    AppServices {
        session: SessionDeps {
            sessions: stores.sessions.clone(),
            organizations: stores.organizations.clone(),
            memberships: stores.memberships.clone(),
            roles: stores.roles.clone(),
            authorization: authorization.clone(),
            clock,
        },
        abac: AbacPolicyDeps {
            policies: stores.policies.clone(),
            resources: stores.resources.clone(),
            authorization: authorization.clone(),
            cache: cache.clone(),
            audit: audit.clone(),
        },
        roles: RoleAdminDeps {
            roles: stores.roles.clone(),
            resources: stores.resources.clone(),
            authorization: authorization.clone(),
            cache: cache.clone(),
            audit: audit.clone(),
        },
        profiles: HrProfileDeps {
            profiles: Arc::new(profile_repo),
            authorization: authorization.clone(),
            cache: cache.clone(),
            audit,
        },
        config,
        stores,
        cache,
        authorization,
    }
}

impl AppServices {
    /// Register an organization and run its bootstrap (builtin roles, seed
    /// ABAC policies).
    pub async fn provision_organization(&self, organization: OrganizationSummary) -> DomainResult<()> {
        let org_id = organization.id.clone();
        self.stores.organizations.upsert(organization);
        ensure_builtin_roles(self.stores.roles.as_ref(), &org_id).await?;
        ensure_abac_policies(self.stores.policies.as_ref(), &org_id).await?;
        tracing::info!(org_id = %org_id, "organization provisioned");
        Ok(())
    }

    /// A small demo tenant for local development.
    pub async fn seed_demo(&self, now: chrono::DateTime<chrono::Utc>) -> DomainResult<()> {
        let org_id = OrgId::new("org-demo");
        self.provision_organization(OrganizationSummary {
            id: org_id.clone(),
            slug: "demo".into(),
            name: "Demo Ltd".into(),
            data_residency: DataResidency::UkOnly,
            data_classification: DataClassification::Official,
            security: OrgSecuritySettings {
                session_timeout_minutes: self.config.default_session_timeout_minutes,
                ..OrgSecuritySettings::default()
            },
        })
        .await?;

        for (user, role, token) in [
            ("user-owner", "owner", "demo-owner-token"),
            ("user-member", "member", "demo-member-token"),
        ] {
            self.stores.memberships.upsert(MembershipRecord {
                org_id: org_id.clone(),
                user_id: UserId::new(user),
                status: Some(MembershipStatus::Active),
                role_name: Some(role.into()),
                metadata: serde_json::Value::Null,
                organization: None,
                activated_at: Some(now),
            });
            self.stores.sessions.insert(SessionRecord {
                session_id: format!("sess-{user}"),
                token: token.into(),
                user_id: UserId::new(user),
                active_organization_id: Some(org_id.clone()),
                created_at: Some(now),
                updated_at: Some(now),
                expires_at: Some(now + Duration::days(7)),
                mfa_enabled: Some(true),
                mfa_verified: Some(true),
                ip_address: None,
                user_agent: None,
            });
        }

        self.stores.profiles.upsert(EmployeeProfile {
            id: "profile-member".into(),
            org_id,
            user_id: UserId::new("user-member"),
            display_name: "Demo Member".into(),
            job_title: Some("Analyst".into()),
            department: Some("Operations".into()),
            data_classification: DataClassification::Official,
            data_residency: DataResidency::UkOnly,
        });

        tracing::warn!("demo tenant seeded; do not enable outside local development");
        Ok(())
    }
}
