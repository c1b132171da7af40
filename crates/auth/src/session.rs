//! Per-organization session security policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use orgcentral_core::{AuthorizationError, AuthorizationReason, OrgId, UserId};

pub const DEFAULT_SESSION_TIMEOUT_MINUTES: u32 = 480;

/// Security settings stored on the organization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrgSecuritySettings {
    pub session_timeout_minutes: u32,
    pub mfa_required: bool,
    pub ip_allowlist_enabled: bool,
    pub ip_allowlist: Vec<String>,
}

impl Default for OrgSecuritySettings {
    fn default() -> Self {
        Self {
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            mfa_required: false,
            ip_allowlist_enabled: false,
            ip_allowlist: Vec::new(),
        }
    }
}

/// An authenticated session as returned by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub token: String,
    pub user_id: UserId,
    pub active_organization_id: Option<OrgId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub mfa_enabled: Option<bool>,
    /// Absent on sessions established before verification was tracked.
    pub mfa_verified: Option<bool>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl SessionRecord {
    /// Last activity: `updated_at`, else `created_at`.
    pub fn last_active_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }

    /// A missing flag counts as verified.
    // Legacy-permissive: sessions without the flag predate challenge tracking.
    pub fn is_mfa_verified(&self) -> bool {
        self.mfa_verified.unwrap_or(true)
    }

    pub fn is_mfa_enabled(&self) -> bool {
        self.mfa_enabled == Some(true)
    }
}

/// Check expiry, idle timeout, MFA and the IP allowlist, in that order.
pub fn enforce_org_session_security(
    session: &SessionRecord,
    settings: &OrgSecuritySettings,
    request_ip: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), AuthorizationError> {
    if session.expires_at.is_some_and(|expires_at| now >= expires_at) {
        return Err(AuthorizationError::new(
            AuthorizationReason::SessionExpired,
            "Session expired for this organization.",
        )
        .with_policy("token"));
    }

    if let Some(last_active) = session.last_active_at() {
        let max_idle = Duration::minutes(i64::from(settings.session_timeout_minutes));
        if now - last_active > max_idle {
            return Err(AuthorizationError::new(
                AuthorizationReason::SessionExpired,
                "Session expired for this organization.",
            )
            .with_policy("idle_timeout"));
        }
    }

    if settings.mfa_required {
        if !session.is_mfa_enabled() {
            return Err(AuthorizationError::new(
                AuthorizationReason::MfaSetupRequired,
                "Multi-factor authentication setup is required for this organization.",
            )
            .with_policy("mfa"));
        }
        if !session.is_mfa_verified() {
            return Err(AuthorizationError::new(
                AuthorizationReason::MfaRequired,
                "Multi-factor authentication is required for this organization.",
            )
            .with_policy("mfa"));
        }
    }

    if settings.ip_allowlist_enabled && !settings.ip_allowlist.is_empty() {
        let ip = request_ip
            .or(session.ip_address.as_deref())
            .map(str::trim)
            .unwrap_or_default();
        if ip.is_empty() {
            return Err(AuthorizationError::new(
                AuthorizationReason::IpDenied,
                "IP allowlist requires a client IP address.",
            )
            .with_policy("ip_allowlist"));
        }
        if !settings.ip_allowlist.iter().any(|entry| entry.trim() == ip) {
            return Err(AuthorizationError::new(
                AuthorizationReason::IpDenied,
                "IP address is not allowlisted for this organization.",
            )
            .with_policy("ip_allowlist"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn session() -> SessionRecord {
        SessionRecord {
            session_id: "sess-1".into(),
            token: "tok-1".into(),
            user_id: UserId::new("user-1"),
            active_organization_id: Some(OrgId::new("org-1")),
            created_at: Some(now() - Duration::minutes(30)),
            updated_at: Some(now() - Duration::minutes(5)),
            expires_at: Some(now() + Duration::hours(8)),
            mfa_enabled: Some(true),
            mfa_verified: None,
            ip_address: Some("10.0.0.1".into()),
            user_agent: None,
        }
    }

    fn reason(result: Result<(), AuthorizationError>) -> (AuthorizationReason, Option<&'static str>) {
        let err = result.unwrap_err();
        (err.reason(), err.policy())
    }

    #[test]
    fn fresh_session_passes_default_settings() {
        assert!(enforce_org_session_security(&session(), &OrgSecuritySettings::default(), None, now()).is_ok());
    }

    #[test]
    fn hard_expiry_is_checked_first() {
        let mut s = session();
        s.expires_at = Some(now());
        s.updated_at = Some(now() - Duration::days(3));
        assert_eq!(
            reason(enforce_org_session_security(&s, &OrgSecuritySettings::default(), None, now())),
            (AuthorizationReason::SessionExpired, Some("token"))
        );
    }

    #[test]
    fn idle_timeout_uses_updated_then_created() {
        let settings = OrgSecuritySettings {
            session_timeout_minutes: 10,
            ..Default::default()
        };
        let mut s = session();
        s.updated_at = None;
        assert_eq!(
            reason(enforce_org_session_security(&s, &settings, None, now())),
            (AuthorizationReason::SessionExpired, Some("idle_timeout"))
        );

        s.updated_at = Some(now() - Duration::minutes(9));
        assert!(enforce_org_session_security(&s, &settings, None, now()).is_ok());
    }

    #[test]
    fn mfa_setup_then_verification() {
        let settings = OrgSecuritySettings {
            mfa_required: true,
            ..Default::default()
        };
        let mut s = session();
        s.mfa_enabled = None;
        assert_eq!(
            reason(enforce_org_session_security(&s, &settings, None, now())).0,
            AuthorizationReason::MfaSetupRequired
        );

        s.mfa_enabled = Some(true);
        s.mfa_verified = Some(false);
        assert_eq!(
            reason(enforce_org_session_security(&s, &settings, None, now())).0,
            AuthorizationReason::MfaRequired
        );

        s.mfa_verified = None;
        assert!(enforce_org_session_security(&s, &settings, None, now()).is_ok());
    }

    #[test]
    fn ip_allowlist_prefers_request_ip() {
        let settings = OrgSecuritySettings {
            ip_allowlist_enabled: true,
            ip_allowlist: vec![" 10.0.0.1 ".into()],
            ..Default::default()
        };
        let s = session();
        assert!(enforce_org_session_security(&s, &settings, None, now()).is_ok());
        assert_eq!(
            reason(enforce_org_session_security(&s, &settings, Some("192.168.1.4"), now())).0,
            AuthorizationReason::IpDenied
        );

        let mut anonymous = session();
        anonymous.ip_address = None;
        let err = enforce_org_session_security(&anonymous, &settings, None, now()).unwrap_err();
        assert_eq!(err.message(), "IP allowlist requires a client IP address.");
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: OrgSecuritySettings = serde_json::from_str(r#"{"mfaRequired":true}"#).unwrap();
        assert!(settings.mfa_required);
        assert_eq!(settings.session_timeout_minutes, DEFAULT_SESSION_TIMEOUT_MINUTES);
    }
}
