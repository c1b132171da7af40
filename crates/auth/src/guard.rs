//! Tenant scope guard.
//!
//! Applied after every fetch-by-id and before every update or delete on an
//! org-scoped record. A record owned by another organization is never handed
//! back to the caller.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use orgcentral_core::{
    AuthorizationError, AuthorizationReason, DataClassification, DomainError, DomainResult, OrgId,
    TenantScoped,
};

use crate::context::RepositoryAuthorizationContext;

pub const CROSS_TENANT_EVENT: &str = "security.cross-tenant-access-attempt";
pub const CLASSIFICATION_EVENT: &str = "security.classification-violation";
pub const RESIDENCY_EVENT: &str = "security.residency-violation";
pub const PII_EVENT: &str = "security.pii-access-denied";

/// Presence check plus org check.
///
/// `None` is `NotFound`; a record owned by another org (or by no org) is an
/// authorization failure with reason `cross_tenant`.
pub fn assert_tenant_record<'a, R>(record: Option<&'a R>, org_id: &OrgId) -> DomainResult<&'a R>
where
    R: TenantScoped + ?Sized,
{
    let Some(record) = record else {
        return Err(DomainError::not_found("Record"));
    };
    if record.org_id() != Some(org_id) {
        return Err(DomainError::Authorization(AuthorizationError::new(
            AuthorizationReason::CrossTenant,
            "Cross-tenant access denied.",
        )));
    }
    Ok(record)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecuritySeverity {
    Medium,
    High,
    Critical,
}

/// A guard violation worth recording in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub event_type: &'static str,
    pub severity: SecuritySeverity,
    pub org_id: OrgId,
    pub user_id: String,
    pub resource_type: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOperation {
    Create,
    Update,
    Delete,
}

impl WriteOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteOperation::Create => "create",
            WriteOperation::Update => "update",
            WriteOperation::Delete => "delete",
        }
    }
}

/// A rejected access, with the event describing it.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct GuardViolation {
    pub error: AuthorizationError,
    pub event: SecurityEvent,
}

impl From<GuardViolation> for DomainError {
    fn from(violation: GuardViolation) -> Self {
        DomainError::Authorization(violation.error)
    }
}

/// Org, classification, residency and PII checks against a context.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantAccessGuard;

impl TenantAccessGuard {
    pub fn assert_readable<R>(
        &self,
        record: &R,
        ctx: &RepositoryAuthorizationContext,
        resource_type: &str,
    ) -> Result<(), GuardViolation>
    where
        R: TenantScoped + ?Sized,
    {
        self.assert_org(record.org_id(), ctx, resource_type, "read")?;

        if let Some(classification) = record.data_classification() {
            if !ctx.data_classification().satisfies(classification) {
                return Err(violation(
                    AuthorizationReason::Classification,
                    "User clearance is insufficient for this classification.",
                    CLASSIFICATION_EVENT,
                    SecuritySeverity::High,
                    ctx,
                    resource_type,
                    json!({
                        "recordClassification": classification.as_str(),
                        "contextClassification": ctx.data_classification().as_str(),
                    }),
                ));
            }
        }

        if let Some(residency) = record.data_residency() {
            if residency != ctx.data_residency() {
                return Err(violation(
                    AuthorizationReason::Residency,
                    "Requested residency zone mismatch.",
                    RESIDENCY_EVENT,
                    SecuritySeverity::High,
                    ctx,
                    resource_type,
                    json!({
                        "recordResidency": residency.as_str(),
                        "contextResidency": ctx.data_residency().as_str(),
                    }),
                ));
            }
        }

        self.assert_pii(ctx, resource_type, "read")
    }

    pub fn assert_writable(
        &self,
        record_org_id: Option<&OrgId>,
        ctx: &RepositoryAuthorizationContext,
        resource_type: &str,
        operation: WriteOperation,
    ) -> Result<(), GuardViolation> {
        self.assert_org(record_org_id, ctx, resource_type, operation.as_str())?;
        self.assert_pii(ctx, resource_type, operation.as_str())
    }

    fn assert_org(
        &self,
        record_org_id: Option<&OrgId>,
        ctx: &RepositoryAuthorizationContext,
        resource_type: &str,
        operation: &str,
    ) -> Result<(), GuardViolation> {
        if record_org_id == Some(ctx.org_id()) {
            return Ok(());
        }
        Err(violation(
            AuthorizationReason::CrossTenant,
            "Cross-tenant access denied.",
            CROSS_TENANT_EVENT,
            SecuritySeverity::Critical,
            ctx,
            resource_type,
            json!({
                "operation": operation,
                "recordOrgId": record_org_id.map(OrgId::as_str),
            }),
        ))
    }

    fn assert_pii(
        &self,
        ctx: &RepositoryAuthorizationContext,
        resource_type: &str,
        operation: &str,
    ) -> Result<(), GuardViolation> {
        if !ctx.pii_access_required() {
            return Ok(());
        }
        let action = if operation == "read" { "read" } else { "write" };
        if !ctx.permissions().grants("pii", action) {
            return Err(violation(
                AuthorizationReason::PiiAccess,
                "Explicit PII access authorization required for this operation.",
                PII_EVENT,
                SecuritySeverity::Medium,
                ctx,
                resource_type,
                json!({ "operation": operation }),
            ));
        }

        let sensitive_read = operation == "read" && ctx.data_classification() >= DataClassification::Secret;
        if sensitive_read && !ctx.mfa_verified() {
            return Err(violation(
                AuthorizationReason::MfaRequired,
                "MFA verification required for reading PII at this classification.",
                PII_EVENT,
                SecuritySeverity::High,
                ctx,
                resource_type,
                json!({
                    "operation": operation,
                    "contextClassification": ctx.data_classification().as_str(),
                }),
            ));
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn violation(
    reason: AuthorizationReason,
    message: &str,
    event_type: &'static str,
    severity: SecuritySeverity,
    ctx: &RepositoryAuthorizationContext,
    resource_type: &str,
    metadata: serde_json::Value,
) -> GuardViolation {
    GuardViolation {
        error: AuthorizationError::new(reason, message),
        event: SecurityEvent {
            event_type,
            severity,
            org_id: ctx.org_id().clone(),
            user_id: ctx.user_id().to_string(),
            resource_type: resource_type.to_string(),
            metadata,
        },
    }
}
