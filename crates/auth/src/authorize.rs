use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use orgcentral_core::{
    AuthorizationError, AuthorizationReason, DataClassification, DataResidency, OrgId, PolicyId,
    UserId,
};

use crate::abac::{self, AbacDecision, AbacPolicy, AbacRequest, AttributeMap, AttributeValue};
use crate::context::RepositoryAuthorizationContext;
use crate::roles::RoleKey;
use crate::PermissionMap;

/// What an operation needs from the caller.
///
/// Everything is optional: an empty request only checks that ABAC (if the
/// org has policies and an action is named) does not object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrgAccessRequest {
    pub required_permissions: PermissionMap,
    /// At least one of these profiles must be satisfied.
    pub required_any_permissions: Vec<PermissionMap>,
    pub expected_classification: Option<DataClassification>,
    pub expected_residency: Option<DataResidency>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_attributes: AttributeMap,
    pub requires_mfa: bool,
}

impl OrgAccessRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requiring(mut self, resource: impl Into<String>, action: impl Into<String>) -> Self {
        self.required_permissions.grant(resource, action);
        self
    }

    pub fn requiring_any(mut self, profile: PermissionMap) -> Self {
        self.required_any_permissions.push(profile);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_resource_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.resource_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_classification(mut self, classification: DataClassification) -> Self {
        self.expected_classification = Some(classification);
        self
    }

    pub fn with_residency(mut self, residency: DataResidency) -> Self {
        self.expected_residency = Some(residency);
        self
    }

    pub fn with_mfa(mut self) -> Self {
        self.requires_mfa = true;
        self
    }

    fn has_role_requirements(&self) -> bool {
        !self.required_permissions.is_empty() || !self.required_any_permissions.is_empty()
    }

    /// Every `(resource, action)` named by the required and required-any maps.
    fn required_pairs(&self) -> BTreeSet<(String, String)> {
        self.required_permissions
            .iter()
            .chain(self.required_any_permissions.iter().flat_map(PermissionMap::iter))
            .map(|(r, a)| (r.to_string(), a.to_string()))
            .collect()
    }
}

/// Outcome of the role-permission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCheck {
    Granted,
    Denied,
    /// The request named no role requirements.
    Abstain,
}

pub fn check_role_permissions(granted: &PermissionMap, request: &OrgAccessRequest) -> RoleCheck {
    if !request.has_role_requirements() {
        return RoleCheck::Abstain;
    }
    if granted.satisfies(&request.required_permissions)
        && granted.satisfies_any(&request.required_any_permissions)
    {
        RoleCheck::Granted
    } else {
        RoleCheck::Denied
    }
}

/// One ABAC question asked during a gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbacEvaluation {
    pub action: String,
    pub resource: String,
    pub decision: AbacDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum GrantSource {
    Role,
    AbacPolicy { policy_id: PolicyId },
    /// Nothing was required and nothing objected.
    Unrestricted,
}

/// Proof that the gate passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub source: GrantSource,
    pub role_check: RoleCheck,
    pub abac: Vec<AbacEvaluation>,
}

/// Full trace of a gate check, shared by enforcement and explanation.
#[derive(Debug, Clone)]
struct GateTrace {
    role_check: Option<RoleCheck>,
    abac: Vec<AbacEvaluation>,
    outcome: Result<GrantSource, AuthorizationError>,
}

fn check_floor(
    ctx: &RepositoryAuthorizationContext,
    request: &OrgAccessRequest,
) -> Result<(), AuthorizationError> {
    if let Some(required) = request.expected_classification {
        if !ctx.data_classification().satisfies(required) {
            return Err(AuthorizationError::new(
                AuthorizationReason::Classification,
                "User clearance is insufficient for this classification.",
            ));
        }
    }
    if let Some(required) = request.expected_residency {
        if required != ctx.data_residency() {
            return Err(AuthorizationError::new(
                AuthorizationReason::Residency,
                "Requested residency zone mismatch.",
            ));
        }
    }
    if request.requires_mfa && !ctx.mfa_verified() {
        return Err(AuthorizationError::new(
            AuthorizationReason::MfaRequired,
            "MFA verification required for this operation.",
        ));
    }
    Ok(())
}

/// The `(action, resource)` pairs ABAC is asked about.
///
/// An explicit action and resource type win; otherwise each required
/// `(resource, action)` becomes action `resource.action` on `resource`.
fn abac_targets(request: &OrgAccessRequest) -> Vec<(String, String)> {
    if let (Some(action), Some(resource)) = (&request.action, &request.resource_type) {
        return vec![(action.clone(), resource.clone())];
    }
    request
        .required_pairs()
        .into_iter()
        .map(|(resource, action)| (format!("{resource}.{action}"), resource))
        .collect()
}

fn run_gate(
    ctx: &RepositoryAuthorizationContext,
    request: &OrgAccessRequest,
    policies: &[AbacPolicy],
) -> GateTrace {
    if let Err(err) = check_floor(ctx, request) {
        return GateTrace {
            role_check: None,
            abac: Vec::new(),
            outcome: Err(err),
        };
    }

    let role_check = check_role_permissions(ctx.permissions(), request);

    let abac: Vec<AbacEvaluation> = if policies.is_empty() {
        Vec::new()
    } else {
        let subject = ctx.abac_subject();
        let resource_attributes = abac_resource_attributes(ctx, request);
        abac_targets(request)
            .into_iter()
            .map(|(action, resource)| {
                let decision = abac::evaluate(
                    policies,
                    &AbacRequest {
                        action: &action,
                        resource: &resource,
                        subject: &subject,
                        resource_attributes: &resource_attributes,
                    },
                );
                AbacEvaluation {
                    action,
                    resource,
                    decision,
                }
            })
            .collect()
    };

    let outcome = decide(ctx, request, role_check, &abac);
    GateTrace {
        role_check: Some(role_check),
        abac,
        outcome,
    }
}

/// Context tier and session flags, overridden by the request's own
/// attributes.
fn abac_resource_attributes(ctx: &RepositoryAuthorizationContext, request: &OrgAccessRequest) -> AttributeMap {
    let mut attributes = AttributeMap::new();
    attributes.insert("residency".into(), AttributeValue::from(ctx.data_residency().as_str()));
    attributes.insert("classification".into(), AttributeValue::from(ctx.data_classification().as_str()));
    attributes.insert("requiresMfa".into(), AttributeValue::from(request.requires_mfa));
    attributes.insert("piiAccessRequired".into(), AttributeValue::from(ctx.pii_access_required()));
    attributes.insert("dataBreachRisk".into(), AttributeValue::from(ctx.data_breach_risk()));
    attributes.extend(
        request
            .resource_attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    attributes
}

fn decide(
    ctx: &RepositoryAuthorizationContext,
    request: &OrgAccessRequest,
    role_check: RoleCheck,
    abac: &[AbacEvaluation],
) -> Result<GrantSource, AuthorizationError> {
    if abac.iter().any(|e| e.decision.is_deny()) {
        return Err(AuthorizationError::new(
            AuthorizationReason::AbacDenied,
            "ABAC policy denied the requested action.",
        ));
    }

    let restricted_tier = ctx.data_classification() >= DataClassification::Secret;
    if role_check != RoleCheck::Abstain && restricted_tier && ctx.role_key() == RoleKey::Custom {
        return Err(AuthorizationError::new(
            AuthorizationReason::Classification,
            "Predefined roles required for access to SECRET or TOP_SECRET data.",
        ));
    }

    let source = decide_source(ctx, request, role_check, abac)?;

    let abac_allowed = abac.iter().any(|e| e.decision.is_allow());
    if abac_allowed && ctx.data_classification() == DataClassification::TopSecret && !ctx.mfa_verified() {
        return Err(AuthorizationError::new(
            AuthorizationReason::MfaRequired,
            "MFA verification required for ABAC-authorized access to TOP_SECRET data.",
        ));
    }
    Ok(source)
}

fn decide_source(
    ctx: &RepositoryAuthorizationContext,
    request: &OrgAccessRequest,
    role_check: RoleCheck,
    abac: &[AbacEvaluation],
) -> Result<GrantSource, AuthorizationError> {
    let first_allow = || {
        abac.iter()
            .find_map(|e| match &e.decision {
                AbacDecision::Allow { policy_id } => Some(policy_id.clone()),
                _ => None,
            })
    };

    match role_check {
        RoleCheck::Granted => Ok(GrantSource::Role),
        RoleCheck::Denied => {
            if abac_covers_requirements(ctx, request, abac) {
                if let Some(policy_id) = first_allow() {
                    return Ok(GrantSource::AbacPolicy { policy_id });
                }
            }
            Err(AuthorizationError::new(
                AuthorizationReason::MissingPermission,
                "RBAC check failed for the requested action.",
            ))
        }
        RoleCheck::Abstain if abac.is_empty() => Ok(GrantSource::Unrestricted),
        RoleCheck::Abstain => match first_allow() {
            Some(policy_id) => Ok(GrantSource::AbacPolicy { policy_id }),
            None => Err(AuthorizationError::new(
                AuthorizationReason::AbacDenied,
                "No ABAC policy allows the requested action.",
            )),
        },
    }
}

/// Can ABAC allows fill every gap the role left?
///
/// For an explicit action the single evaluation decides. For derived pairs a
/// pair counts when the role grants it or its evaluation allowed it.
fn abac_covers_requirements(
    ctx: &RepositoryAuthorizationContext,
    request: &OrgAccessRequest,
    abac: &[AbacEvaluation],
) -> bool {
    if request.action.is_some() && request.resource_type.is_some() {
        return abac.iter().any(|e| e.decision.is_allow());
    }

    let pair_ok = |resource: &str, action: &str| {
        ctx.permissions().grants(resource, action)
            || abac.iter().any(|e| {
                e.decision.is_allow() && e.resource == resource && e.action == format!("{resource}.{action}")
            })
    };
    let profile_ok = |profile: &PermissionMap| profile.iter().all(|(r, a)| pair_ok(r, a));

    profile_ok(&request.required_permissions)
        && (request.required_any_permissions.is_empty()
            || request.required_any_permissions.iter().any(|p| profile_ok(p)))
}

/// The gate every use case calls before acting.
///
/// Classification, residency and MFA floor first; then the role check; then
/// ABAC. An ABAC deny always wins, an ABAC allow can grant what the role
/// lacks, and no ABAC match leaves the role result standing.
#[instrument(
    level = "debug",
    skip(ctx, request, policies),
    fields(
        org_id = %ctx.org_id(),
        user_id = %ctx.user_id(),
        correlation_id = %ctx.correlation_id(),
        action = request.action.as_deref(),
    )
)]
pub fn ensure_org_access(
    ctx: &RepositoryAuthorizationContext,
    request: &OrgAccessRequest,
    policies: &[AbacPolicy],
) -> Result<AccessGrant, AuthorizationError> {
    let trace = run_gate(ctx, request, policies);
    match trace.outcome {
        Ok(source) => Ok(AccessGrant {
            source,
            role_check: trace.role_check.unwrap_or(RoleCheck::Abstain),
            abac: trace.abac,
        }),
        Err(err) => {
            tracing::warn!(reason = %err.reason(), error = %err, "access denied");
            Err(err)
        }
    }
}

/// Role-only check of a single permission.
pub fn enforce_permission(
    ctx: &RepositoryAuthorizationContext,
    resource: &str,
    action: &str,
) -> Result<(), AuthorizationError> {
    let request = OrgAccessRequest::new()
        .requiring(resource, action)
        .with_classification(ctx.data_classification())
        .with_residency(ctx.data_residency());
    ensure_org_access(ctx, &request, &[]).map(|_| ())
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request was (or would be) allowed or denied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationExplanation {
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Machine-readable denial reason.
    pub denial_reason: Option<AuthorizationReason>,

    pub subject: SubjectState,

    /// `None` when the floor check failed before roles were looked at.
    pub role_check: Option<RoleCheck>,

    pub abac_evaluations: Vec<AbacEvaluation>,

    /// Required `resource:action` pairs the role does not grant.
    pub missing_permissions: Vec<String>,

    pub suggestions: Vec<String>,
}

/// The caller as the gate saw it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectState {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role_key: RoleKey,
    pub role_name: Option<String>,
    pub data_classification: DataClassification,
    pub data_residency: DataResidency,
    pub mfa_verified: bool,
    pub effective_permissions: PermissionMap,
}

pub fn explain_authorization(
    ctx: &RepositoryAuthorizationContext,
    request: &OrgAccessRequest,
    policies: &[AbacPolicy],
) -> AuthorizationExplanation {
    let trace = run_gate(ctx, request, policies);

    let missing_permissions: Vec<String> = request
        .required_permissions
        .iter()
        .filter(|(r, a)| !ctx.permissions().grants(r, a))
        .map(|(r, a)| format!("{r}:{a}"))
        .collect();

    let (granted, reason, denial_reason, suggestions) = match &trace.outcome {
        Ok(GrantSource::Role) => (
            true,
            "Role permissions satisfy every requirement".to_string(),
            None,
            vec![],
        ),
        Ok(GrantSource::AbacPolicy { policy_id }) => (
            true,
            format!("ABAC policy '{policy_id}' allows the request"),
            None,
            vec![],
        ),
        Ok(GrantSource::Unrestricted) => (
            true,
            "No requirements were named and no policy objected".to_string(),
            None,
            vec![],
        ),
        Err(err) => (
            false,
            err.message().to_string(),
            Some(err.reason()),
            suggestions_for(err.reason(), &missing_permissions),
        ),
    };

    AuthorizationExplanation {
        granted,
        reason,
        denial_reason,
        subject: SubjectState {
            org_id: ctx.org_id().clone(),
            user_id: ctx.user_id().clone(),
            role_key: ctx.role_key(),
            role_name: ctx.role_name().map(str::to_string),
            data_classification: ctx.data_classification(),
            data_residency: ctx.data_residency(),
            mfa_verified: ctx.mfa_verified(),
            effective_permissions: ctx.permissions().clone(),
        },
        role_check: trace.role_check,
        abac_evaluations: trace.abac,
        missing_permissions,
        suggestions,
    }
}

fn suggestions_for(reason: AuthorizationReason, missing: &[String]) -> Vec<String> {
    match reason {
        AuthorizationReason::MissingPermission => {
            let mut out = vec![format!(
                "Grant the role the missing permissions: {}",
                missing.join(", ")
            )];
            out.push("Or add an ABAC allow policy covering the action".to_string());
            out
        }
        AuthorizationReason::AbacDenied => vec![
            "Review the organization's ABAC policies for a matching deny rule".to_string(),
            "Check policy priorities: lower numbers are evaluated first".to_string(),
        ],
        AuthorizationReason::Classification => {
            vec!["The caller's clearance is below the data classification".to_string()]
        }
        AuthorizationReason::Residency => {
            vec!["The caller's residency zone differs from the data's zone".to_string()]
        }
        AuthorizationReason::MfaRequired => {
            vec!["Complete multi-factor verification and retry".to_string()]
        }
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abac::{AbacEffect, PolicyCondition};
    use crate::roles::RoleScope;

    fn member_ctx() -> RepositoryAuthorizationContext {
        RepositoryAuthorizationContext::builder(OrgId::new("org-1"), UserId::new("user-1"))
            .role(RoleKey::Member, Some("member".into()), None, RoleScope::Org)
            .permissions(PermissionMap::single("organization", "read"))
            .mfa(true, false)
            .build()
    }

    fn update_org() -> OrgAccessRequest {
        OrgAccessRequest::new().requiring("organization", "update")
    }

    #[test]
    fn missing_role_permission_is_denied_without_policies() {
        let err = ensure_org_access(&member_ctx(), &update_org(), &[]).unwrap_err();
        assert_eq!(err.reason(), AuthorizationReason::MissingPermission);
    }

    #[test]
    fn abac_allow_grants_what_role_lacks() {
        let policies = vec![
            AbacPolicy::new("p1", AbacEffect::Allow, &["organization.update"], &["organization"])
                .with_priority(1),
        ];
        let grant = ensure_org_access(&member_ctx(), &update_org(), &policies).unwrap();
        assert_eq!(
            grant.source,
            GrantSource::AbacPolicy {
                policy_id: PolicyId::new("p1")
            }
        );
        assert_eq!(grant.role_check, RoleCheck::Denied);
    }

    #[test]
    fn deny_overrides_role_grant() {
        let policies = vec![
            AbacPolicy::new("deny", AbacEffect::Deny, &["organization.read"], &["organization"])
                .with_priority(1),
            AbacPolicy::new("allow", AbacEffect::Allow, &["*"], &["*"]).with_priority(5),
        ];
        let request = OrgAccessRequest::new().requiring("organization", "read");
        let err = ensure_org_access(&member_ctx(), &request, &policies).unwrap_err();
        assert_eq!(err.reason(), AuthorizationReason::AbacDenied);
    }

    fn ctx_at(
        role: RoleKey,
        classification: DataClassification,
        mfa_verified: bool,
    ) -> RepositoryAuthorizationContext {
        RepositoryAuthorizationContext::builder(OrgId::new("org-1"), UserId::new("user-1"))
            .role(role, Some("payroll-clerk".into()), None, RoleScope::Org)
            .permissions(PermissionMap::single("organization", "read"))
            .data_classification(classification)
            .mfa(mfa_verified, false)
            .build()
    }

    #[test]
    fn custom_roles_are_refused_at_secret_and_above() {
        let request = OrgAccessRequest::new().requiring("organization", "read");
        let secret = ctx_at(RoleKey::Custom, DataClassification::Secret, true);
        let err = ensure_org_access(&secret, &request, &[]).unwrap_err();
        assert_eq!(err.reason(), AuthorizationReason::Classification);

        let official = ctx_at(RoleKey::Custom, DataClassification::Official, true);
        assert!(ensure_org_access(&official, &request, &[]).is_ok());
        let predefined = ctx_at(RoleKey::HrAdmin, DataClassification::Secret, true);
        assert!(ensure_org_access(&predefined, &request, &[]).is_ok());
    }

    #[test]
    fn abac_allowed_top_secret_access_needs_mfa() {
        let policies = vec![AbacPolicy::new("allow", AbacEffect::Allow, &["*"], &["*"])];
        let request = OrgAccessRequest::new().with_action("hr.absence.read", "hr.absence");

        let err = ensure_org_access(
            &ctx_at(RoleKey::HrAdmin, DataClassification::TopSecret, false),
            &request,
            &policies,
        )
        .unwrap_err();
        assert_eq!(err.reason(), AuthorizationReason::MfaRequired);

        assert!(ensure_org_access(
            &ctx_at(RoleKey::HrAdmin, DataClassification::TopSecret, true),
            &request,
            &policies
        )
        .is_ok());
        assert!(ensure_org_access(
            &ctx_at(RoleKey::HrAdmin, DataClassification::Secret, false),
            &request,
            &policies
        )
        .is_ok());
    }

    #[test]
    fn resource_conditions_see_context_tier_unless_overridden() {
        let policies = vec![
            AbacPolicy::new("deny-secret", AbacEffect::Deny, &["*"], &["*"])
                .with_priority(1)
                .with_condition(PolicyCondition::ResourceAttributeEquals {
                    attribute: "classification".into(),
                    value: "SECRET".into(),
                }),
            AbacPolicy::new("allow", AbacEffect::Allow, &["*"], &["*"]).with_priority(2),
        ];
        let request = OrgAccessRequest::new().with_action("hr.absence.read", "hr.absence");
        let secret = ctx_at(RoleKey::HrAdmin, DataClassification::Secret, true);

        let err = ensure_org_access(&secret, &request, &policies).unwrap_err();
        assert_eq!(err.reason(), AuthorizationReason::AbacDenied);

        let overridden = request.with_resource_attribute("classification", "OFFICIAL");
        assert!(ensure_org_access(&secret, &overridden, &policies).is_ok());
    }

    #[test]
    fn no_match_defers_to_role() {
        let policies = vec![AbacPolicy::new("other", AbacEffect::Deny, &["billing.*"], &["billing"])];
        let ok = OrgAccessRequest::new().requiring("organization", "read");
        assert_eq!(
            ensure_org_access(&member_ctx(), &ok, &policies).unwrap().source,
            GrantSource::Role
        );
        assert_eq!(
            ensure_org_access(&member_ctx(), &update_org(), &policies)
                .unwrap_err()
                .reason(),
            AuthorizationReason::MissingPermission
        );
    }

    #[test]
    fn abstain_fails_closed_when_abac_matches_nothing() {
        let policies = vec![AbacPolicy::new("other", AbacEffect::Allow, &["billing.*"], &["billing"])];
        let request = OrgAccessRequest::new().with_action("hr.leave.request.read", "hr.leave.request");
        let err = ensure_org_access(&member_ctx(), &request, &policies).unwrap_err();
        assert_eq!(err.reason(), AuthorizationReason::AbacDenied);

        assert_eq!(
            ensure_org_access(&member_ctx(), &request, &[]).unwrap().source,
            GrantSource::Unrestricted
        );
        assert_eq!(
            ensure_org_access(&member_ctx(), &OrgAccessRequest::new(), &policies)
                .unwrap()
                .source,
            GrantSource::Unrestricted
        );
    }

    #[test]
    fn resource_attributes_feed_conditions() {
        let policies = vec![
            AbacPolicy::new("self", AbacEffect::Allow, &["hr.people.profile.update"], &["hr.people.profile"])
                .with_condition(PolicyCondition::SubjectMatchesResource {
                    subject_attribute: "userId".into(),
                    resource_attribute: "userId".into(),
                }),
        ];
        let own = OrgAccessRequest::new()
            .requiring("hr.people.profile", "update")
            .with_resource_attribute("userId", "user-1");
        assert!(ensure_org_access(&member_ctx(), &own, &policies).is_ok());

        let other = OrgAccessRequest::new()
            .requiring("hr.people.profile", "update")
            .with_resource_attribute("userId", "user-2");
        assert!(ensure_org_access(&member_ctx(), &other, &policies).is_err());
    }

    #[test]
    fn abac_allow_must_cover_every_missing_pair() {
        let policies = vec![AbacPolicy::new(
            "p1",
            AbacEffect::Allow,
            &["organization.update"],
            &["organization"],
        )];
        let request = update_org().requiring("billing", "update");
        let err = ensure_org_access(&member_ctx(), &request, &policies).unwrap_err();
        assert_eq!(err.reason(), AuthorizationReason::MissingPermission);
    }

    #[test]
    fn floor_checks_run_first() {
        let ctx = member_ctx();
        let secret = update_org().with_classification(DataClassification::Secret);
        assert_eq!(
            ensure_org_access(&ctx, &secret, &[]).unwrap_err().reason(),
            AuthorizationReason::Classification
        );

        let eea = OrgAccessRequest::new().with_residency(DataResidency::UkAndEea);
        assert_eq!(
            ensure_org_access(&ctx, &eea, &[]).unwrap_err().reason(),
            AuthorizationReason::Residency
        );

        let unverified = RepositoryAuthorizationContext::builder(OrgId::new("org-1"), UserId::new("user-1"))
            .mfa(false, true)
            .build();
        assert_eq!(
            ensure_org_access(&unverified, &OrgAccessRequest::new().with_mfa(), &[])
                .unwrap_err()
                .reason(),
            AuthorizationReason::MfaRequired
        );
    }

    #[test]
    fn required_any_needs_one_profile() {
        let request = OrgAccessRequest::new()
            .requiring_any(PermissionMap::single("organization", "update"))
            .requiring_any(PermissionMap::single("organization", "read"));
        assert!(ensure_org_access(&member_ctx(), &request, &[]).is_ok());
    }

    #[test]
    fn enforce_permission_is_role_only() {
        assert!(enforce_permission(&member_ctx(), "organization", "read").is_ok());
        assert_eq!(
            enforce_permission(&member_ctx(), "organization", "update")
                .unwrap_err()
                .reason(),
            AuthorizationReason::MissingPermission
        );
    }

    #[test]
    fn explanation_lists_missing_permissions() {
        let explanation = explain_authorization(&member_ctx(), &update_org(), &[]);
        assert!(!explanation.granted);
        assert_eq!(explanation.denial_reason, Some(AuthorizationReason::MissingPermission));
        assert_eq!(explanation.missing_permissions, vec!["organization:update".to_string()]);
        assert!(!explanation.suggestions.is_empty());

        let json = serde_json::to_value(&explanation).unwrap();
        assert_eq!(json["denialReason"], "missing_permission");
        assert_eq!(json["roleCheck"], "denied");
    }
}
