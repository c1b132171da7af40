//! Process configuration read from the environment.

use std::net::SocketAddr;

use orgcentral_auth::SecurityPolicyOverrides;
use orgcentral_auth::session::DEFAULT_SESSION_TIMEOUT_MINUTES;
use orgcentral_infra::cache::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECONDS};

pub const BIND_ADDR_ENV: &str = "ORGCENTRAL_BIND_ADDR";
pub const SESSION_TIMEOUT_ENV: &str = "ORGCENTRAL_DEFAULT_SESSION_TIMEOUT_MINUTES";
pub const CACHE_TTL_ENV: &str = "ORGCENTRAL_CACHE_TTL_SECONDS";
pub const CACHE_MAX_ENTRIES_ENV: &str = "ORGCENTRAL_CACHE_MAX_ENTRIES";
pub const AUDIT_BUFFER_ENV: &str = "ORGCENTRAL_AUDIT_BUFFER";
pub const SECURITY_POLICIES_ENV: &str = "ORGCENTRAL_SECURITY_POLICIES";
pub const SEED_DEMO_ENV: &str = "ORGCENTRAL_SEED_DEMO";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not valid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Applied to seeded organizations that carry no explicit setting.
    pub default_session_timeout_minutes: u32,
    pub cache_ttl_seconds: i64,
    pub cache_max_entries: usize,
    /// Size of the in-process audit buffer; 0 leaves only the tracing sink.
    pub audit_buffer_capacity: usize,
    /// JSON overrides merged over the platform security defaults.
    pub security: SecurityPolicyOverrides,
    pub seed_demo: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            default_session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            audit_buffer_capacity: 0,
            security: SecurityPolicyOverrides::default(),
            seed_demo: false,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(BIND_ADDR_ENV) {
            config.bind_addr = parse(BIND_ADDR_ENV, &raw)?;
        }
        if let Some(raw) = lookup(SESSION_TIMEOUT_ENV) {
            let minutes: u32 = parse(SESSION_TIMEOUT_ENV, &raw)?;
            if minutes == 0 {
                return Err(ConfigError::Invalid {
                    name: SESSION_TIMEOUT_ENV,
                    value: raw,
                });
            }
            config.default_session_timeout_minutes = minutes;
        }
        if let Some(raw) = lookup(CACHE_TTL_ENV) {
            let seconds: i64 = parse(CACHE_TTL_ENV, &raw)?;
            if seconds <= 0 {
                return Err(ConfigError::Invalid {
                    name: CACHE_TTL_ENV,
                    value: raw,
                });
            }
            config.cache_ttl_seconds = seconds;
        }
        if let Some(raw) = lookup(CACHE_MAX_ENTRIES_ENV) {
            let entries: usize = parse(CACHE_MAX_ENTRIES_ENV, &raw)?;
            if entries == 0 {
                return Err(ConfigError::Invalid {
                    name: CACHE_MAX_ENTRIES_ENV,
                    value: raw,
                });
            }
            config.cache_max_entries = entries;
        }
        if let Some(raw) = lookup(AUDIT_BUFFER_ENV) {
            config.audit_buffer_capacity = parse(AUDIT_BUFFER_ENV, &raw)?;
        }
        if let Some(raw) = lookup(SECURITY_POLICIES_ENV) {
            config.security = serde_json::from_str(&raw).map_err(|_| ConfigError::Invalid {
                name: SECURITY_POLICIES_ENV,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(SEED_DEMO_ENV) {
            config.seed_demo = matches!(raw.trim(), "1" | "true" | "yes");
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}
