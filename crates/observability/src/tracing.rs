//! Tracing/logging initialization.
//!
//! JSON lines by default so audit (`target: "audit"`) and security events
//! (`security_event` field) can be shipped as-is. `RUST_LOG` controls the
//! filter; `ORGCENTRAL_LOG_FORMAT=pretty` switches to human-readable output.

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_ENV: &str = "ORGCENTRAL_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Unknown values fall back to JSON.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }

    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

/// Root span for one HTTP request. `org_id` and `user_id` start empty and are
/// recorded once the session context is resolved.
pub fn request_span(method: &str, path: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        %method,
        %path,
        correlation_id = %correlation_id,
        org_id = tracing::field::Empty,
        user_id = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_defaults_to_json() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(" TEXT "), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    }

    #[test]
    fn init_is_idempotent() {
        init(LogFormat::Json);
        init(LogFormat::Pretty);
        let span = request_span("GET", "/health", "corr-1");
        span.record("org_id", "org-1");
    }
}
