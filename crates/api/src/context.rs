use std::sync::Arc;

use axum::http::{HeaderMap, header};

use orgcentral_auth::RepositoryAuthorizationContext;
use orgcentral_infra::use_cases::{SessionAccessRequest, SessionContext};

pub const SESSION_COOKIE: &str = "session_token";
pub const ORG_SLUG_HEADER: &str = "x-org-slug";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Headers a proxy or the frontend may use to say where the user was going.
const NEXT_URL_HEADERS: &[&str] = &[
    "next-url",
    "x-next-url",
    "x-invoke-path",
    "x-matched-path",
    "x-original-url",
    "x-rewrite-url",
];

/// Resolved org context for a request.
///
/// This is immutable and must be present for all org-scoped routes.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<SessionContext>,
}

impl RequestContext {
    pub fn new(context: SessionContext) -> Self {
        Self {
            inner: Arc::new(context),
        }
    }

    pub fn authorization(&self) -> &RepositoryAuthorizationContext {
        &self.inner.authorization
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner
    }
}

/// Everything the session resolver needs from the raw request.
pub fn session_request_from_headers(headers: &HeaderMap, correlation_id: &str) -> SessionAccessRequest {
    SessionAccessRequest {
        session_token: bearer_token(headers).or_else(|| cookie(headers, SESSION_COOKIE)),
        org_slug: header_str(headers, ORG_SLUG_HEADER).map(str::to_string),
        request_ip: first_value(headers, "x-forwarded-for").or_else(|| first_value(headers, "x-real-ip")),
        user_agent: header_str(headers, header::USER_AGENT.as_str()).map(str::to_string),
        correlation_id: Some(correlation_id.to_string()),
        audit_source: None,
        next_url: NEXT_URL_HEADERS
            .iter()
            .find_map(|name| header_str(headers, name))
            .map(str::to_string),
        pii_access_required: false,
        required: None,
    }
}

/// The caller's correlation id, or a fresh one.
pub fn correlation_id(headers: &HeaderMap) -> String {
    header_str(headers, CORRELATION_ID_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string())
}

/// Browsers get redirects; API clients get JSON errors.
pub fn wants_html(headers: &HeaderMap) -> bool {
    header_str(headers, header::ACCEPT.as_str()).is_some_and(|accept| accept.contains("text/html"))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    header_str(headers, name)?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::AUTHORIZATION.as_str())?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let h = headers(&[
            ("authorization", "Bearer tok-a"),
            ("cookie", "theme=dark; session_token=tok-b"),
        ]);
        assert_eq!(session_request_from_headers(&h, "c").session_token.as_deref(), Some("tok-a"));

        let h = headers(&[("cookie", "theme=dark; session_token=tok-b")]);
        assert_eq!(session_request_from_headers(&h, "c").session_token.as_deref(), Some("tok-b"));
    }

    #[test]
    fn request_metadata_is_extracted() {
        let h = headers(&[
            ("x-org-slug", "acme"),
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("user-agent", "curl/8"),
            ("x-matched-path", "/hr/profiles"),
        ]);
        let req = session_request_from_headers(&h, "corr-9");
        assert_eq!(req.org_slug.as_deref(), Some("acme"));
        assert_eq!(req.request_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(req.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(req.correlation_id.as_deref(), Some("corr-9"));
        assert_eq!(req.next_url.as_deref(), Some("/hr/profiles"));
        assert!(req.session_token.is_none());
    }

    #[test]
    fn correlation_id_is_generated_when_missing() {
        assert_eq!(correlation_id(&headers(&[("x-correlation-id", "abc")])), "abc");
        assert!(!correlation_id(&HeaderMap::new()).is_empty());
    }
}
