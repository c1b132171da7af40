//! Session → authorization context.
//!
//! ## Resolution order
//!
//! 1. Session by token (none: `unauthenticated`)
//! 2. Organization: explicit slug, else the session's active org, else the
//!    user's most recently activated membership (none: `missing_organization`)
//! 3. Membership must be `ACTIVE`
//! 4. Org session security (expiry, idle timeout, MFA, IP allowlist)
//! 5. Role permissions: template roles flatten their template, custom roles
//!    merge their own row with every inherited row
//! 6. Context built once and never mutated; optional required permissions are
//!    enforced immediately
//!
//! [`get_session_context_or_redirect`] turns the failures UI callers can
//! remediate into a redirect instead of an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use orgcentral_auth::abac::{AttributeValue, MEMBERSHIP_STATUS_ATTRIBUTE, attributes_from_json};
use orgcentral_auth::context::DEFAULT_AUDIT_SOURCE;
use orgcentral_auth::roles::{RoleScope, flatten_template_permissions, role_template};
use orgcentral_auth::{
    MembershipRecord, MembershipStatus, OrgAccessRequest, OrganizationSummary, PermissionMap,
    RepositoryAuthorizationContext, RoleKey, SessionRecord, check_membership_status,
    enforce_org_session_security,
};
use orgcentral_core::{AuthorizationReason, DomainError, DomainResult, OrgId, RoleId};

use crate::clock::Clock;
use crate::repositories::{MembershipRepository, OrganizationRepository, RoleRepository, SessionLookup};
use crate::services::AuthorizationService;

pub const ABAC_SUBJECT_ATTRIBUTES_KEY: &str = "abacSubjectAttributes";
pub const AUDIT_BATCH_ID_KEY: &str = "auditBatchId";
pub const DEFAULT_NEXT_PATH: &str = "/dashboard";

#[derive(Clone)]
pub struct SessionDeps {
    pub sessions: Arc<dyn SessionLookup>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub authorization: Arc<AuthorizationService>,
    pub clock: Arc<dyn Clock>,
}

/// Everything a request contributes to context building.
#[derive(Debug, Clone, Default)]
pub struct SessionAccessRequest {
    pub session_token: Option<String>,
    pub org_slug: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub correlation_id: Option<String>,
    pub audit_source: Option<String>,
    /// Raw "where was the user going" value, e.g. from a `next-url` header.
    pub next_url: Option<String>,
    pub pii_access_required: bool,
    pub required: Option<OrgAccessRequest>,
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session: SessionRecord,
    pub organization: OrganizationSummary,
    pub membership: MembershipRecord,
    pub authorization: RepositoryAuthorizationContext,
}

#[tracing::instrument(level = "debug", skip_all, fields(org_slug = request.org_slug.as_deref()))]
pub async fn get_session_context(
    deps: &SessionDeps,
    request: &SessionAccessRequest,
) -> DomainResult<SessionContext> {
    let session = load_session(deps, request).await?;
    let organization = resolve_organization(deps, &session, request.org_slug.as_deref()).await?;

    let membership = deps
        .memberships
        .find_membership(&organization.id, &session.user_id)
        .await?;
    let membership = check_membership_status(membership, &[MembershipStatus::Active])?;

    enforce_org_session_security(
        &session,
        &organization.security,
        request.request_ip.as_deref(),
        deps.clock.now(),
    )?;

    let role = resolve_role(deps, &organization.id, membership.role_name.as_deref()).await?;
    let authorization = build_context(deps, request, &session, &organization, &membership, role);

    if let Some(required) = &request.required {
        deps.authorization.authorize(&authorization, required).await?;
    }

    tracing::debug!(
        org_id = %authorization.org_id(),
        user_id = %authorization.user_id(),
        role = %authorization.role_key(),
        correlation_id = %authorization.correlation_id(),
        "session context resolved"
    );

    Ok(SessionContext {
        session,
        organization,
        membership,
        authorization,
    })
}

async fn load_session(deps: &SessionDeps, request: &SessionAccessRequest) -> DomainResult<SessionRecord> {
    let token = request
        .session_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let session = match token {
        Some(token) => deps.sessions.get_session(token).await?,
        None => None,
    };
    session.ok_or_else(|| {
        DomainError::unauthorized(
            AuthorizationReason::Unauthenticated,
            "Authenticated session is required.",
        )
    })
}

async fn resolve_organization(
    deps: &SessionDeps,
    session: &SessionRecord,
    slug: Option<&str>,
) -> DomainResult<OrganizationSummary> {
    if let Some(slug) = slug.map(str::trim).filter(|s| !s.is_empty()) {
        // An unknown slug looks exactly like a missing membership.
        return deps.organizations.find_by_slug(slug).await?.ok_or_else(|| {
            DomainError::unauthorized(
                AuthorizationReason::MembershipNotFound,
                "Membership not found for this operation.",
            )
        });
    }

    if let Some(org_id) = &session.active_organization_id {
        if let Some(organization) = deps.organizations.find_by_id(org_id).await? {
            return Ok(organization);
        }
    }

    let memberships = deps
        .memberships
        .list_memberships_for_user(&session.user_id)
        .await?;
    let latest = memberships
        .into_iter()
        .filter(|m| m.status.is_none_or(|s| s == MembershipStatus::Active))
        .max_by_key(|m| m.activated_at);
    if let Some(membership) = latest {
        if let Some(organization) = membership.organization {
            return Ok(organization);
        }
        if let Some(organization) = deps.organizations.find_by_id(&membership.org_id).await? {
            return Ok(organization);
        }
    }

    Err(DomainError::unauthorized(
        AuthorizationReason::MissingOrganization,
        "Organization id was not provided.",
    ))
}

struct ResolvedRole {
    key: RoleKey,
    name: Option<String>,
    id: Option<RoleId>,
    scope: RoleScope,
    permissions: PermissionMap,
}

async fn resolve_role(
    deps: &SessionDeps,
    org_id: &OrgId,
    role_name: Option<&str>,
) -> DomainResult<ResolvedRole> {
    let key = RoleKey::from_role_name(role_name);
    let row = match role_name {
        Some(name) => deps.roles.get_role_by_name(org_id, name).await?,
        None => None,
    };

    if let Some(template) = role_template(key) {
        return Ok(ResolvedRole {
            key,
            name: role_name.map(str::to_string),
            id: row.map(|r| r.id),
            scope: template.scope,
            permissions: flatten_template_permissions(key),
        });
    }

    let Some(row) = row else {
        return Ok(ResolvedRole {
            key,
            name: role_name.map(str::to_string),
            id: None,
            scope: RoleScope::Org,
            permissions: PermissionMap::new(),
        });
    };

    let mut permissions = row.permissions.clone();
    let mut visited: BTreeSet<RoleId> = BTreeSet::from([row.id.clone()]);
    let mut pending: Vec<RoleId> = row.inherits_role_ids.clone();
    while let Some(id) = pending.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(inherited) = deps.roles.get_role(org_id, &id).await? {
            permissions.merge(&inherited.permissions);
            pending.extend(inherited.inherits_role_ids);
        }
    }

    Ok(ResolvedRole {
        key,
        name: Some(row.name),
        id: Some(row.id),
        scope: row.scope,
        permissions,
    })
}

fn build_context(
    deps: &SessionDeps,
    request: &SessionAccessRequest,
    session: &SessionRecord,
    organization: &OrganizationSummary,
    membership: &MembershipRecord,
    role: ResolvedRole,
) -> RepositoryAuthorizationContext {
    let mut attributes = membership
        .metadata
        .get(ABAC_SUBJECT_ATTRIBUTES_KEY)
        .map(attributes_from_json)
        .unwrap_or_default();
    if let Some(status) = membership.status {
        attributes.insert(
            MEMBERSHIP_STATUS_ATTRIBUTE.to_string(),
            AttributeValue::from(status.as_str()),
        );
    }
    let audit_batch_id = membership
        .metadata
        .get(AUDIT_BATCH_ID_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let security = deps.authorization.security_policies();
    let classification = security.apply_classification_floor(organization.data_classification);
    let requires_mfa = security.requires_mfa_for_role(role.key.as_str())
        || classification.is_sensitive()
        || organization.security.mfa_required;

    RepositoryAuthorizationContext::builder(organization.id.clone(), session.user_id.clone())
        .role(role.key, role.name, role.id, role.scope)
        .permissions(role.permissions)
        .data_classification(classification)
        .data_residency(organization.data_residency)
        .audit_source(
            request
                .audit_source
                .clone()
                .unwrap_or_else(|| DEFAULT_AUDIT_SOURCE.to_string()),
        )
        .audit_batch_id(audit_batch_id)
        .correlation_id(request.correlation_id.clone())
        .session(Some(session.session_id.clone()), Some(session.token.clone()))
        .mfa(session.is_mfa_verified(), requires_mfa)
        .pii_access_required(request.pii_access_required)
        .session_times(session.created_at, session.expires_at, session.last_active_at())
        .authorized_at(deps.clock.now())
        .provenance(
            request.request_ip.clone().or_else(|| session.ip_address.clone()),
            request.user_agent.clone().or_else(|| session.user_agent.clone()),
        )
        .abac_attributes(attributes)
        .build()
}

// ─────────────────────────────────────────────────────────────────────────────
// Redirects
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RedirectOptions {
    pub next_path: Option<String>,
    pub login_path: Option<String>,
    pub not_invited_path: Option<String>,
    pub access_denied_path: Option<String>,
    pub mfa_setup_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRedirect {
    pub location: String,
    pub reason: AuthorizationReason,
}

#[derive(Debug, Clone)]
pub enum SessionResolution {
    Ready(Box<SessionContext>),
    Redirect(SessionRedirect),
}

/// [`get_session_context`], with remediable authorization failures turned
/// into redirects. Non-authorization errors propagate.
pub async fn get_session_context_or_redirect(
    deps: &SessionDeps,
    request: &SessionAccessRequest,
    options: &RedirectOptions,
) -> DomainResult<SessionResolution> {
    match get_session_context(deps, request).await {
        Ok(context) => Ok(SessionResolution::Ready(Box::new(context))),
        Err(DomainError::Authorization(err)) => {
            let next = options
                .next_path
                .as_deref()
                .and_then(safe_next_path)
                .or_else(|| {
                    request
                        .next_url
                        .as_deref()
                        .and_then(normalize_next_url)
                        .as_deref()
                        .and_then(safe_next_path)
                })
                .unwrap_or_else(|| DEFAULT_NEXT_PATH.to_string());
            let reason = err.reason();
            let location = redirect_location(reason, &next, options);
            tracing::info!(reason = %reason, location = %location, "session redirect");
            Ok(SessionResolution::Redirect(SessionRedirect { location, reason }))
        }
        Err(other) => Err(other),
    }
}

fn redirect_location(reason: AuthorizationReason, next: &str, options: &RedirectOptions) -> String {
    let path = |custom: &Option<String>, default: &str| custom.clone().unwrap_or_else(|| default.to_string());
    match reason {
        AuthorizationReason::MembershipNotFound => {
            with_query(&path(&options.not_invited_path, "/not-invited"), next, None)
        }
        AuthorizationReason::MissingOrganization => with_query("/api/auth/post-login", next, None),
        AuthorizationReason::Unauthenticated => {
            with_query(&path(&options.login_path, "/login"), next, None)
        }
        AuthorizationReason::SessionExpired => with_query(
            &path(&options.login_path, "/login"),
            next,
            Some("session_expired"),
        ),
        AuthorizationReason::MfaSetupRequired => {
            with_query(&path(&options.mfa_setup_path, "/two-factor/setup"), next, None)
        }
        _ => path(&options.access_denied_path, "/access-denied"),
    }
}

/// `path` with `next` (and `reason`) query parameters added unless already present.
fn with_query(path: &str, next: &str, reason: Option<&str>) -> String {
    let Ok(mut url) = Url::parse("http://localhost").and_then(|base| base.join(path)) else {
        return path.to_string();
    };
    let has = |key: &str| url.query_pairs().any(|(k, _)| k == key);
    let add_next = !has("next");
    let add_reason = reason.filter(|_| !has("reason"));
    {
        let mut pairs = url.query_pairs_mut();
        if add_next {
            pairs.append_pair("next", next);
        }
        if let Some(reason) = add_reason {
            pairs.append_pair("reason", reason);
        }
    }
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// A same-site absolute path, or nothing.
fn safe_next_path(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if !trimmed.starts_with('/') || trimmed.starts_with("//") || trimmed.contains("://") {
        return None;
    }
    Some(trimmed.to_string())
}

/// Header values may carry a full URL; keep only its path and query.
fn normalize_next_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        return Some(trimmed.to_string());
    }
    let url = Url::parse(trimmed).ok()?;
    Some(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditLog;
    use crate::cache::OrgCache;
    use crate::clock::FixedClock;
    use crate::repositories::{
        InMemoryAbacPolicyRepository, InMemoryMembershipRepository, InMemoryOrganizationRepository,
        InMemoryRoleRepository, InMemorySessionStore,
    };
    use crate::use_cases::bootstrap::ensure_builtin_roles;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use orgcentral_auth::{NewRole, OrgSecuritySettings, SecurityPolicies};
    use orgcentral_core::{DataClassification, DataResidency, UserId};
    use serde_json::json;

    struct Fixture {
        deps: SessionDeps,
        sessions: Arc<InMemorySessionStore>,
        organizations: Arc<InMemoryOrganizationRepository>,
        memberships: Arc<InMemoryMembershipRepository>,
        roles: Arc<InMemoryRoleRepository>,
        clock: Arc<FixedClock>,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn organization(id: &str, slug: &str) -> OrganizationSummary {
        OrganizationSummary {
            id: OrgId::new(id),
            slug: slug.into(),
            name: slug.to_uppercase(),
            data_residency: DataResidency::UkOnly,
            data_classification: DataClassification::Official,
            security: OrgSecuritySettings::default(),
        }
    }

    fn membership(org: &str, role: &str, status: MembershipStatus) -> MembershipRecord {
        MembershipRecord {
            org_id: OrgId::new(org),
            user_id: UserId::new("user-1"),
            status: Some(status),
            role_name: Some(role.into()),
            metadata: json!({
                "abacSubjectAttributes": { "department": "people", "nested": { "x": 1 } },
                "auditBatchId": "batch-7"
            }),
            organization: None,
            activated_at: Some(now() - Duration::days(30)),
        }
    }

    fn session(active_org: Option<&str>) -> SessionRecord {
        SessionRecord {
            session_id: "sess-1".into(),
            token: "tok-1".into(),
            user_id: UserId::new("user-1"),
            active_organization_id: active_org.map(OrgId::new),
            created_at: Some(now() - Duration::minutes(30)),
            updated_at: Some(now() - Duration::minutes(5)),
            expires_at: Some(now() + Duration::hours(24)),
            mfa_enabled: Some(true),
            mfa_verified: Some(true),
            ip_address: Some("10.0.0.9".into()),
            user_agent: Some("test-agent".into()),
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(SecurityPolicies::default()).await
    }

    async fn fixture_with(security: SecurityPolicies) -> Fixture {
        let sessions = Arc::new(InMemorySessionStore::new());
        let organizations = Arc::new(InMemoryOrganizationRepository::new());
        let memberships = Arc::new(InMemoryMembershipRepository::new());
        let roles = Arc::new(InMemoryRoleRepository::new());
        let clock = Arc::new(FixedClock::new(now()));
        let audit = Arc::new(InMemoryAuditLog::new());
        let cache = Arc::new(OrgCache::with_default_ttl(clock.clone()));
        let authorization = Arc::new(AuthorizationService::new(
            Arc::new(InMemoryAbacPolicyRepository::new()),
            cache,
            audit,
            security,
        ));

        organizations.upsert(organization("org-1", "acme"));
        memberships.upsert(membership("org-1", "member", MembershipStatus::Active));
        sessions.insert(session(Some("org-1")));
        ensure_builtin_roles(roles.as_ref(), &OrgId::new("org-1")).await.unwrap();

        Fixture {
            deps: SessionDeps {
                sessions: sessions.clone(),
                organizations: organizations.clone(),
                memberships: memberships.clone(),
                roles: roles.clone(),
                authorization,
                clock: clock.clone(),
            },
            sessions,
            organizations,
            memberships,
            roles,
            clock,
        }
    }

    fn request() -> SessionAccessRequest {
        SessionAccessRequest {
            session_token: Some("tok-1".into()),
            correlation_id: Some("corr-1".into()),
            ..SessionAccessRequest::default()
        }
    }

    fn reason_of(result: DomainResult<SessionContext>) -> Option<AuthorizationReason> {
        result.err().and_then(|e| e.authorization_reason())
    }

    #[tokio::test]
    async fn classification_floor_raises_the_context_tier() {
        let security = SecurityPolicies {
            data_classification_floor: DataClassification::Secret,
            ..SecurityPolicies::default()
        };
        let f = fixture_with(security).await;
        let ctx = get_session_context(&f.deps, &request()).await.unwrap();

        assert_eq!(ctx.authorization.data_classification(), DataClassification::Secret);
        assert!(ctx.authorization.requires_mfa());
        assert_eq!(ctx.organization.data_classification, DataClassification::Official);
    }

    #[tokio::test]
    async fn builds_context_from_session_and_membership() {
        let f = fixture().await;
        let ctx = get_session_context(&f.deps, &request()).await.unwrap();
        let auth = &ctx.authorization;

        assert_eq!(auth.org_id(), &OrgId::new("org-1"));
        assert_eq!(auth.tenant_scope().org_id, OrgId::new("org-1"));
        assert_eq!(auth.role_key(), RoleKey::Member);
        assert!(auth.role_id().is_some());
        assert_eq!(auth.permissions(), &flatten_template_permissions(RoleKey::Member));
        assert_eq!(auth.correlation_id(), "corr-1");
        assert_eq!(auth.audit_batch_id(), Some("batch-7"));
        assert_eq!(auth.ip_address(), Some("10.0.0.9"));
        assert!(auth.mfa_verified());
        assert!(!auth.requires_mfa());
        assert_eq!(
            auth.abac_attributes().get("department"),
            Some(&AttributeValue::from("people"))
        );
        assert!(auth.abac_attributes().get("nested").is_none());
        assert_eq!(
            auth.abac_attributes().get(MEMBERSHIP_STATUS_ATTRIBUTE),
            Some(&AttributeValue::from("ACTIVE"))
        );
    }

    #[tokio::test]
    async fn missing_or_unknown_session_is_unauthenticated() {
        let f = fixture().await;
        let mut req = request();
        req.session_token = None;
        assert_eq!(
            reason_of(get_session_context(&f.deps, &req).await),
            Some(AuthorizationReason::Unauthenticated)
        );
        req.session_token = Some("forged".into());
        assert_eq!(
            reason_of(get_session_context(&f.deps, &req).await),
            Some(AuthorizationReason::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn explicit_slug_wins_and_unknown_slug_is_not_invited() {
        let f = fixture().await;
        f.organizations.upsert(organization("org-2", "globex"));
        f.memberships.upsert(membership("org-2", "manager", MembershipStatus::Active));

        let mut req = request();
        req.org_slug = Some("globex".into());
        let ctx = get_session_context(&f.deps, &req).await.unwrap();
        assert_eq!(ctx.organization.id, OrgId::new("org-2"));
        assert_eq!(ctx.authorization.role_key(), RoleKey::Manager);

        req.org_slug = Some("initech".into());
        assert_eq!(
            reason_of(get_session_context(&f.deps, &req).await),
            Some(AuthorizationReason::MembershipNotFound)
        );
    }

    #[tokio::test]
    async fn falls_back_to_most_recent_membership_then_fails() {
        let f = fixture().await;
        f.sessions.insert(session(None));
        f.organizations.upsert(organization("org-2", "globex"));
        let mut newer = membership("org-2", "member", MembershipStatus::Active);
        newer.activated_at = Some(now() - Duration::days(1));
        f.memberships.upsert(newer);

        let ctx = get_session_context(&f.deps, &request()).await.unwrap();
        assert_eq!(ctx.organization.id, OrgId::new("org-2"));

        let lonely = SessionRecord {
            user_id: UserId::new("user-2"),
            token: "tok-2".into(),
            ..session(None)
        };
        f.sessions.insert(lonely);
        let mut req = request();
        req.session_token = Some("tok-2".into());
        assert_eq!(
            reason_of(get_session_context(&f.deps, &req).await),
            Some(AuthorizationReason::MissingOrganization)
        );
    }

    #[tokio::test]
    async fn invited_members_cannot_build_a_context() {
        let f = fixture().await;
        f.memberships.upsert(membership("org-1", "member", MembershipStatus::Invited));
        assert_eq!(
            reason_of(get_session_context(&f.deps, &request()).await),
            Some(AuthorizationReason::MembershipInactive)
        );
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let f = fixture().await;
        f.clock.advance(Duration::minutes(481));
        let err = get_session_context(&f.deps, &request()).await.unwrap_err();
        match err {
            DomainError::Authorization(e) => {
                assert_eq!(e.reason(), AuthorizationReason::SessionExpired);
                assert_eq!(e.policy(), Some("idle_timeout"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sensitive_orgs_and_privileged_roles_require_mfa() {
        let f = fixture().await;
        let mut secret = organization("org-1", "acme");
        secret.data_classification = DataClassification::Secret;
        f.organizations.upsert(secret);
        let ctx = get_session_context(&f.deps, &request()).await.unwrap();
        assert!(ctx.authorization.requires_mfa());

        f.organizations.upsert(organization("org-1", "acme"));
        f.memberships.upsert(membership("org-1", "owner", MembershipStatus::Active));
        let ctx = get_session_context(&f.deps, &request()).await.unwrap();
        assert!(ctx.authorization.requires_mfa());
    }

    #[tokio::test]
    async fn custom_roles_merge_inherited_rows() {
        let f = fixture().await;
        let org = OrgId::new("org-1");
        let base = f
            .roles
            .create_role(
                &org,
                NewRole {
                    name: "payroll-base".into(),
                    description: None,
                    scope: RoleScope::Org,
                    permissions: PermissionMap::single("hr.people.profile", "read"),
                    inherits_role_ids: Vec::new(),
                    is_system: false,
                    is_default: false,
                },
            )
            .await
            .unwrap();
        let payroll = f
            .roles
            .create_role(
                &org,
                NewRole {
                    name: "payroll".into(),
                    description: None,
                    scope: RoleScope::Org,
                    permissions: PermissionMap::single("hr.people.contract", "read"),
                    inherits_role_ids: vec![base.id.clone()],
                    is_system: false,
                    is_default: false,
                },
            )
            .await
            .unwrap();
        // Cycle back to the child must not loop.
        f.roles
            .update_role(
                &org,
                &base.id,
                orgcentral_auth::RoleUpdate {
                    inherits_role_ids: Some(vec![payroll.id.clone()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.memberships.upsert(membership("org-1", "payroll", MembershipStatus::Active));

        let ctx = get_session_context(&f.deps, &request()).await.unwrap();
        let auth = &ctx.authorization;
        assert_eq!(auth.role_key(), RoleKey::Custom);
        assert_eq!(auth.role_name(), Some("payroll"));
        assert!(auth.permissions().grants("hr.people.contract", "read"));
        assert!(auth.permissions().grants("hr.people.profile", "read"));
    }

    #[tokio::test]
    async fn required_permissions_are_enforced_immediately() {
        let f = fixture().await;
        let mut req = request();
        req.required = Some(OrgAccessRequest::new().requiring("organization", "delete"));
        assert_eq!(
            reason_of(get_session_context(&f.deps, &req).await),
            Some(AuthorizationReason::MissingPermission)
        );
    }

    async fn redirect_for(f: &Fixture, req: &SessionAccessRequest, options: &RedirectOptions) -> SessionRedirect {
        match get_session_context_or_redirect(&f.deps, req, options).await.unwrap() {
            SessionResolution::Redirect(redirect) => redirect,
            SessionResolution::Ready(_) => panic!("expected a redirect"),
        }
    }

    #[tokio::test]
    async fn redirects_are_classified_by_reason() {
        let f = fixture().await;
        let options = RedirectOptions {
            next_path: Some("/hr/profile".into()),
            ..RedirectOptions::default()
        };

        let mut req = request();
        req.session_token = None;
        assert_eq!(
            redirect_for(&f, &req, &options).await.location,
            "/login?next=%2Fhr%2Fprofile"
        );

        let mut req = request();
        req.org_slug = Some("initech".into());
        assert_eq!(
            redirect_for(&f, &req, &options).await.location,
            "/not-invited?next=%2Fhr%2Fprofile"
        );

        let mut req = request();
        req.required = Some(OrgAccessRequest::new().requiring("organization", "delete"));
        assert_eq!(redirect_for(&f, &req, &options).await.location, "/access-denied");

        f.clock.advance(Duration::hours(9));
        let expired = redirect_for(&f, &request(), &options).await;
        assert_eq!(expired.reason, AuthorizationReason::SessionExpired);
        assert_eq!(
            expired.location,
            "/login?next=%2Fhr%2Fprofile&reason=session_expired"
        );
    }

    #[tokio::test]
    async fn mfa_setup_and_missing_org_redirects() {
        let f = fixture().await;
        let mut strict = organization("org-1", "acme");
        strict.security.mfa_required = true;
        f.organizations.upsert(strict);
        let mut no_mfa = session(Some("org-1"));
        no_mfa.mfa_enabled = Some(false);
        f.sessions.insert(no_mfa);

        let redirect = redirect_for(&f, &request(), &RedirectOptions::default()).await;
        assert_eq!(redirect.location, "/two-factor/setup?next=%2Fdashboard");

        let lonely = SessionRecord {
            user_id: UserId::new("user-2"),
            token: "tok-2".into(),
            ..session(None)
        };
        f.sessions.insert(lonely);
        let mut req = request();
        req.session_token = Some("tok-2".into());
        req.next_url = Some("https://app.example.com/leave?tab=mine".into());
        assert_eq!(
            redirect_for(&f, &req, &RedirectOptions::default()).await.location,
            "/api/auth/post-login?next=%2Fleave%3Ftab%3Dmine"
        );
    }

    #[test]
    fn next_paths_must_stay_on_site() {
        assert_eq!(safe_next_path(" /hr "), Some("/hr".to_string()));
        assert_eq!(safe_next_path("//evil.example"), None);
        assert_eq!(safe_next_path("https://evil.example"), None);
        assert_eq!(safe_next_path("/redirect?to=https://evil"), None);
        assert_eq!(safe_next_path("hr"), None);
    }

    #[test]
    fn existing_query_parameters_are_kept() {
        assert_eq!(with_query("/login?next=%2Fa", "/b", None), "/login?next=%2Fa");
        assert_eq!(
            with_query("/login?reason=custom", "/b", Some("session_expired")),
            "/login?reason=custom&next=%2Fb"
        );
    }
}
