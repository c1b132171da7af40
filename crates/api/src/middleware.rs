use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::Instrument;

use orgcentral_infra::use_cases::{
    RedirectOptions, SessionResolution, get_session_context, get_session_context_or_redirect,
};
use orgcentral_observability::request_span;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{self, CORRELATION_ID_HEADER, RequestContext};

/// Resolve the session into an org context before any org-scoped handler runs.
///
/// Browser requests (`Accept: text/html`) that fail with a remediable reason
/// are redirected; everything else gets the JSON error envelope.
pub async fn session_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let correlation_id = context::correlation_id(req.headers());
    let span = request_span(req.method().as_str(), req.uri().path(), &correlation_id);

    let mut response = async {
        let request = context::session_request_from_headers(req.headers(), &correlation_id);

        let resolved = if context::wants_html(req.headers()) {
            let options = RedirectOptions {
                next_path: Some(req.uri().path().to_string()),
                ..RedirectOptions::default()
            };
            match get_session_context_or_redirect(&services.session, &request, &options).await {
                Ok(SessionResolution::Ready(ctx)) => Ok(*ctx),
                Ok(SessionResolution::Redirect(redirect)) => {
                    return Redirect::to(&redirect.location).into_response();
                }
                Err(err) => Err(err),
            }
        } else {
            get_session_context(&services.session, &request).await
        };

        let session = match resolved {
            Ok(session) => session,
            Err(err) => {
                tracing::info!(error = %err, "session rejected");
                return errors::domain_error_to_response(err);
            }
        };

        let span = tracing::Span::current();
        span.record("org_id", session.authorization.org_id().as_str());
        span.record("user_id", session.authorization.user_id().as_str());

        req.extensions_mut().insert(RequestContext::new(session));
        next.run(req).await
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
