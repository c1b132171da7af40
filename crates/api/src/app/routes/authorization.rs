//! Authorization debugging: "why was this request denied?"

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use orgcentral_auth::OrgAccessRequest;

use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainQuery {
    /// `resource:action`, e.g. `hr.leave.request:approve`.
    pub permission: String,
    /// Resource type for ABAC when it differs from the permission resource.
    pub resource_type: Option<String>,
}

pub fn router() -> Router {
    Router::new().route("/explain", get(explain))
}

/// GET /org/authorization/explain?permission=resource:action
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ExplainQuery>,
) -> axum::response::Response {
    let Some((resource, action)) = query
        .permission
        .split_once(':')
        .filter(|(r, a)| !r.trim().is_empty() && !a.trim().is_empty())
    else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "permission must look like resource:action",
        );
    };
    let (resource, action) = (resource.trim(), action.trim());

    let mut request = OrgAccessRequest::new().requiring(resource, action);
    if let Some(resource_type) = query.resource_type.as_deref() {
        request = request.with_action(format!("{resource}.{action}"), resource_type);
    }

    match services.authorization.explain(ctx.authorization(), &request).await {
        Ok(explanation) => (StatusCode::OK, Json(explanation)).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}
