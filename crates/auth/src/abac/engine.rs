//! ABAC policy evaluation.
//!
//! Evaluation is a pure function of the policy list and one request: policies
//! are ordered by `priority` (ascending, stable on list order) and the first
//! policy whose selectors and condition all match decides. No match is
//! [`AbacDecision::NotApplicable`], which is neither a grant nor a deny.

use tracing::instrument;

use super::selector::any_selector_matches;
use super::types::{AbacDecision, AbacEffect, AbacPolicy, AbacRequest};

/// Policies in evaluation order.
pub fn order_policies(policies: &[AbacPolicy]) -> Vec<&AbacPolicy> {
    let mut ordered: Vec<&AbacPolicy> = policies.iter().collect();
    // `sort_by_key` is stable, so equal priorities keep list order.
    ordered.sort_by_key(|policy| policy.priority);
    ordered
}

/// Does `policy` apply to `request`?
pub fn policy_applies(policy: &AbacPolicy, request: &AbacRequest<'_>) -> bool {
    any_selector_matches(&policy.actions, request.action)
        && any_selector_matches(&policy.resources, request.resource)
        && policy
            .condition
            .as_ref()
            .is_none_or(|condition| condition.holds(request.subject, request.resource_attributes))
}

#[instrument(
    level = "debug",
    skip(policies, request),
    fields(
        org_id = %request.subject.org_id,
        user_id = %request.subject.user_id,
        action = %request.action,
        resource = %request.resource,
        policy_count = policies.len(),
    )
)]
pub fn evaluate(policies: &[AbacPolicy], request: &AbacRequest<'_>) -> AbacDecision {
    let decision = order_policies(policies)
        .into_iter()
        .find(|policy| policy_applies(policy, request))
        .map(|policy| match policy.effect {
            AbacEffect::Allow => AbacDecision::Allow {
                policy_id: policy.id.clone(),
            },
            AbacEffect::Deny => AbacDecision::Deny {
                policy_id: policy.id.clone(),
            },
        })
        .unwrap_or(AbacDecision::NotApplicable);

    tracing::debug!(?decision, "abac evaluated");
    decision
}
