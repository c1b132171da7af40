use orgcentral_auth::membership::DEFAULT_ALLOWED_MEMBERSHIP_STATUSES;
use orgcentral_auth::{MembershipRecord, MembershipStatus, check_membership_status};
use orgcentral_core::{DomainResult, OrgId, UserId};

use crate::repositories::MembershipRepository;

/// Load `(org_id, user_id)` and require its status to be in `allowed`
/// (default: `ACTIVE` or `INVITED`).
pub async fn require_active_membership(
    memberships: &dyn MembershipRepository,
    org_id: &OrgId,
    user_id: &UserId,
    allowed: Option<&[MembershipStatus]>,
) -> DomainResult<MembershipRecord> {
    let membership = memberships.find_membership(org_id, user_id).await?;
    check_membership_status(
        membership,
        allowed.unwrap_or(DEFAULT_ALLOWED_MEMBERSHIP_STATUSES),
    )
}
