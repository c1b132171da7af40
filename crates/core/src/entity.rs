//! Entity traits: identity + tenant ownership.

use crate::{DataClassification, DataResidency, OrgId};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity owned by exactly one organization.
///
/// `org_id` is optional because legacy rows may lack the discriminator; a
/// missing owner never matches any caller's org.
pub trait TenantScoped {
    fn org_id(&self) -> Option<&OrgId>;

    /// Classification tier stamped on the record, if any.
    fn data_classification(&self) -> Option<DataClassification> {
        None
    }

    /// Residency zone stamped on the record, if any.
    fn data_residency(&self) -> Option<DataResidency> {
        None
    }
}

impl<T: TenantScoped + ?Sized> TenantScoped for &T {
    fn org_id(&self) -> Option<&OrgId> {
        (**self).org_id()
    }

    fn data_classification(&self) -> Option<DataClassification> {
        (**self).data_classification()
    }

    fn data_residency(&self) -> Option<DataResidency> {
        (**self).data_residency()
    }
}
