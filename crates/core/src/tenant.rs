//! Tenant boundary primitives: classification tiers, residency zones, scope.

use serde::{Deserialize, Serialize};

use crate::OrgId;

/// Data-sensitivity tier. Ordered: `Official < OfficialSensitive < Secret < TopSecret`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataClassification {
    #[default]
    Official,
    OfficialSensitive,
    Secret,
    TopSecret,
}

impl DataClassification {
    pub fn as_str(self) -> &'static str {
        match self {
            DataClassification::Official => "OFFICIAL",
            DataClassification::OfficialSensitive => "OFFICIAL_SENSITIVE",
            DataClassification::Secret => "SECRET",
            DataClassification::TopSecret => "TOP_SECRET",
        }
    }

    /// Whether a holder of this clearance may touch data at `required`.
    pub fn satisfies(self, required: DataClassification) -> bool {
        self >= required
    }

    /// Only `OFFICIAL` data may ever be written into a shared cache.
    pub fn is_cache_eligible(self) -> bool {
        self == DataClassification::Official
    }

    /// `SECRET` and above.
    pub fn is_sensitive(self) -> bool {
        self >= DataClassification::Secret
    }
}

impl core::fmt::Display for DataClassification {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data-sovereignty zone attached to tenant data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataResidency {
    #[default]
    UkOnly,
    UkAndEea,
    Global,
}

impl DataResidency {
    pub fn as_str(self) -> &'static str {
        match self {
            DataResidency::UkOnly => "UK_ONLY",
            DataResidency::UkAndEea => "UK_AND_EEA",
            DataResidency::Global => "GLOBAL",
        }
    }
}

impl core::fmt::Display for DataResidency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized tenant-scoping subset handed to repositories that need only
/// scoping, not full permission data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantScope {
    pub org_id: OrgId,
    pub data_residency: DataResidency,
    pub data_classification: DataClassification,
    pub audit_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_batch_id: Option<String>,
}
