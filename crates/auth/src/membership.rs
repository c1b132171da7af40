//! Organization memberships and the status check applied to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orgcentral_core::{
    AuthorizationReason, DataClassification, DataResidency, DomainError, DomainResult, OrgId,
    TenantScoped, UserId,
};

use crate::session::OrgSecuritySettings;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Invited,
    Suspended,
    Deactivated,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Invited => "INVITED",
            MembershipStatus::Suspended => "SUSPENDED",
            MembershipStatus::Deactivated => "DEACTIVATED",
        }
    }
}

/// Statuses accepted by the membership guard unless the caller narrows them.
pub const DEFAULT_ALLOWED_MEMBERSHIP_STATUSES: &[MembershipStatus] =
    &[MembershipStatus::Active, MembershipStatus::Invited];

/// The organization a membership points at, with its security posture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: OrgId,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub data_residency: DataResidency,
    #[serde(default)]
    pub data_classification: DataClassification,
    #[serde(default)]
    pub security: OrgSecuritySettings,
}

impl TenantScoped for OrganizationSummary {
    fn org_id(&self) -> Option<&OrgId> {
        Some(&self.id)
    }

    fn data_classification(&self) -> Option<DataClassification> {
        Some(self.data_classification)
    }

    fn data_residency(&self) -> Option<DataResidency> {
        Some(self.data_residency)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    pub org_id: OrgId,
    pub user_id: UserId,
    /// Absent on legacy rows.
    #[serde(default)]
    pub status: Option<MembershipStatus>,
    #[serde(default)]
    pub role_name: Option<String>,
    /// Free-form profile data; narrowed into ABAC attributes when a context is built.
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub organization: Option<OrganizationSummary>,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
}

impl TenantScoped for MembershipRecord {
    fn org_id(&self) -> Option<&OrgId> {
        Some(&self.org_id)
    }
}

/// Membership status check.
///
/// No membership fails with `MembershipNotFound`; a status outside `allowed`
/// fails with `MembershipInactive`. A membership with no status passes.
pub fn check_membership_status(
    membership: Option<MembershipRecord>,
    allowed: &[MembershipStatus],
) -> DomainResult<MembershipRecord> {
    let Some(membership) = membership else {
        return Err(DomainError::unauthorized(
            AuthorizationReason::MembershipNotFound,
            "Membership not found for this operation.",
        ));
    };

    match membership.status {
        // Legacy-permissive: rows written before status existed are let through.
        None => Ok(membership),
        Some(status) if allowed.contains(&status) => Ok(membership),
        Some(_) => Err(DomainError::unauthorized(
            AuthorizationReason::MembershipInactive,
            "Membership is not active for this operation.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(status: Option<MembershipStatus>) -> MembershipRecord {
        MembershipRecord {
            org_id: OrgId::new("org-1"),
            user_id: UserId::new("user-1"),
            status,
            role_name: Some("member".into()),
            metadata: serde_json::Value::Null,
            organization: None,
            activated_at: None,
        }
    }

    #[test]
    fn active_and_invited_pass_by_default() {
        for status in [MembershipStatus::Active, MembershipStatus::Invited] {
            let result = check_membership_status(Some(membership(Some(status))), DEFAULT_ALLOWED_MEMBERSHIP_STATUSES);
            assert_eq!(result.unwrap().status, Some(status));
        }
    }

    #[test]
    fn suspended_fails_with_inactive_reason() {
        let err = check_membership_status(
            Some(membership(Some(MembershipStatus::Suspended))),
            DEFAULT_ALLOWED_MEMBERSHIP_STATUSES,
        )
        .unwrap_err();
        assert_eq!(err.authorization_reason(), Some(AuthorizationReason::MembershipInactive));
        assert_eq!(err.to_string(), "Membership is not active for this operation.");
    }

    #[test]
    fn missing_status_is_allowed() {
        assert!(check_membership_status(Some(membership(None)), &[MembershipStatus::Active]).is_ok());
    }

    #[test]
    fn absent_membership_is_not_found() {
        let err = check_membership_status(None, DEFAULT_ALLOWED_MEMBERSHIP_STATUSES).unwrap_err();
        assert_eq!(err.authorization_reason(), Some(AuthorizationReason::MembershipNotFound));
    }

    #[test]
    fn legacy_rows_deserialize_without_status() {
        let record: MembershipRecord =
            serde_json::from_str(r#"{"orgId":"org-1","userId":"user-1"}"#).unwrap();
        assert_eq!(record.status, None);
        assert!(record.metadata.is_null());
    }
}
