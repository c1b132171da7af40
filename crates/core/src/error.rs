//! Error model shared by the authorization core and its collaborators.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the authorization core.
pub type DomainResult<T> = Result<T, DomainError>;

/// Machine-readable tag attached to every authorization failure.
///
/// UI callers branch on this (redirect to login, MFA setup, "not invited"),
/// API callers surface it in the JSON error envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationReason {
    Unauthenticated,
    SessionExpired,
    MfaSetupRequired,
    MfaRequired,
    IpDenied,
    MissingOrganization,
    MembershipNotFound,
    MembershipInactive,
    MissingPermission,
    AbacDenied,
    Classification,
    Residency,
    CrossTenant,
    PiiAccess,
}

impl AuthorizationReason {
    /// Stable snake_case code.
    pub fn code(self) -> &'static str {
        match self {
            AuthorizationReason::Unauthenticated => "unauthenticated",
            AuthorizationReason::SessionExpired => "session_expired",
            AuthorizationReason::MfaSetupRequired => "mfa_setup_required",
            AuthorizationReason::MfaRequired => "mfa_required",
            AuthorizationReason::IpDenied => "ip_denied",
            AuthorizationReason::MissingOrganization => "missing_organization",
            AuthorizationReason::MembershipNotFound => "membership_not_found",
            AuthorizationReason::MembershipInactive => "membership_inactive",
            AuthorizationReason::MissingPermission => "missing_permission",
            AuthorizationReason::AbacDenied => "abac_denied",
            AuthorizationReason::Classification => "classification",
            AuthorizationReason::Residency => "residency",
            AuthorizationReason::CrossTenant => "cross_tenant",
            AuthorizationReason::PiiAccess => "pii_access",
        }
    }
}

impl core::fmt::Display for AuthorizationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// The caller is authenticated (or claims to be) but is not permitted.
///
/// Always fails closed: nothing downstream of a returned `AuthorizationError`
/// may run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthorizationError {
    message: String,
    reason: AuthorizationReason,
    policy: Option<&'static str>,
}

impl AuthorizationError {
    pub fn new(reason: AuthorizationReason, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason,
            policy: None,
        }
    }

    /// Tag the error with the policy that produced it (e.g. `"idle_timeout"`).
    pub fn with_policy(mut self, policy: &'static str) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn reason(&self) -> AuthorizationReason {
        self.reason
    }

    pub fn policy(&self) -> Option<&'static str> {
        self.policy
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error taxonomy of the authorization core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input to a security-adjacent operation. Rejected before any
    /// persistence happens.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced tenant-scoped record does not exist.
    #[error("{entity} not found")]
    NotFound { entity: String },

    /// Optimistic-concurrency mismatch on versioned resources.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// A collaborator (repository, cache) failed.
    #[error("repository failure: {0}")]
    Repository(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    pub fn unauthorized(reason: AuthorizationReason, msg: impl Into<String>) -> Self {
        Self::Authorization(AuthorizationError::new(reason, msg))
    }

    /// The authorization reason, if this is an authorization failure.
    pub fn authorization_reason(&self) -> Option<AuthorizationReason> {
        match self {
            DomainError::Authorization(e) => Some(e.reason()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_error_displays_message_and_keeps_reason() {
        let err = AuthorizationError::new(
            AuthorizationReason::SessionExpired,
            "Session expired for this organization.",
        )
        .with_policy("idle_timeout");

        assert_eq!(err.to_string(), "Session expired for this organization.");
        assert_eq!(err.reason().code(), "session_expired");
        assert_eq!(err.policy(), Some("idle_timeout"));

        let domain: DomainError = err.into();
        assert_eq!(
            domain.authorization_reason(),
            Some(AuthorizationReason::SessionExpired)
        );
    }

    #[test]
    fn non_authorization_errors_have_no_reason() {
        assert_eq!(DomainError::validation("bad").authorization_reason(), None);
        assert_eq!(
            DomainError::not_found("Membership").to_string(),
            "Membership not found"
        );
    }
}
