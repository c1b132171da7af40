//! Policies seeded into an organization that has none.

use super::types::{AbacEffect, AbacPolicy, AttributeValue, PolicyCondition};

/// Subject attribute carrying the caller's membership status.
pub const MEMBERSHIP_STATUS_ATTRIBUTE: &str = "membershipStatus";

pub fn default_bootstrap_policies() -> Vec<AbacPolicy> {
    vec![
        AbacPolicy::new("default-deny-suspended", AbacEffect::Deny, &["*"], &["*"])
            .with_priority(1)
            .with_condition(PolicyCondition::SubjectAttributeEquals {
                attribute: MEMBERSHIP_STATUS_ATTRIBUTE.to_string(),
                value: AttributeValue::Text("SUSPENDED".to_string()),
            }),
        AbacPolicy::new("default-admin-allow-all", AbacEffect::Allow, &["*"], &["*"])
            .with_priority(10)
            .with_condition(PolicyCondition::SubjectRoleIn {
                roles: vec!["owner".to_string(), "orgAdmin".to_string()],
            }),
        AbacPolicy::new(
            "default-self-service-profile",
            AbacEffect::Allow,
            &["hr.people.profile.read", "hr.people.profile.update"],
            &["hr.people.profile"],
        )
        .with_priority(50)
        .with_condition(PolicyCondition::SubjectMatchesResource {
            subject_attribute: "userId".to_string(),
            resource_attribute: "userId".to_string(),
        }),
        AbacPolicy::new(
            "default-compliance-read",
            AbacEffect::Allow,
            &["hr.compliance.read", "audit.read", "residency.read"],
            &["hr.compliance", "audit", "residency"],
        )
        .with_priority(60)
        .with_condition(PolicyCondition::SubjectRoleIn {
            roles: vec!["compliance".to_string()],
        }),
    ]
}
