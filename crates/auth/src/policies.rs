//! Platform-wide security policy defaults.

use serde::{Deserialize, Serialize};

use orgcentral_core::DataClassification;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaPolicy {
    /// Role keys that must always hold a verified second factor.
    pub enforced_roles: Vec<String>,
    /// Action prefixes that count as privileged.
    pub enforced_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPolicy {
    /// Payload keys replaced before an event reaches any sink.
    pub redact_sensitive_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicies {
    pub mfa: MfaPolicy,
    pub audit: AuditPolicy,
    /// No session context is built below this tier.
    pub data_classification_floor: DataClassification,
}

impl Default for SecurityPolicies {
    fn default() -> Self {
        Self {
            mfa: MfaPolicy {
                enforced_roles: vec!["owner".into(), "orgAdmin".into(), "compliance".into()],
                enforced_actions: vec!["governance".into(), "invite".into(), "residency.enforce".into()],
            },
            audit: AuditPolicy {
                redact_sensitive_fields: vec![
                    "niNumber".into(),
                    "healthData".into(),
                    "diversityAttributes".into(),
                ],
            },
            data_classification_floor: DataClassification::Official,
        }
    }
}

/// Section-level overrides; `None` keeps the default section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityPolicyOverrides {
    pub mfa: Option<MfaPolicy>,
    pub audit: Option<AuditPolicy>,
    pub data_classification_floor: Option<DataClassification>,
}

pub fn resolve_security_policies(overrides: SecurityPolicyOverrides) -> SecurityPolicies {
    let defaults = SecurityPolicies::default();
    SecurityPolicies {
        mfa: overrides.mfa.unwrap_or(defaults.mfa),
        audit: overrides.audit.unwrap_or(defaults.audit),
        data_classification_floor: overrides
            .data_classification_floor
            .unwrap_or(defaults.data_classification_floor),
    }
}

impl SecurityPolicies {
    /// Does `action` start with any enforced action prefix?
    pub fn is_privileged_action(&self, action: &str) -> bool {
        self.mfa
            .enforced_actions
            .iter()
            .any(|prefix| action.starts_with(prefix.as_str()))
    }

    pub fn requires_mfa_for_role(&self, role: &str) -> bool {
        self.mfa.enforced_roles.iter().any(|r| r == role)
    }

    /// `classification`, raised to the configured floor.
    pub fn apply_classification_floor(&self, classification: DataClassification) -> DataClassification {
        classification.max(self.data_classification_floor)
    }
}
