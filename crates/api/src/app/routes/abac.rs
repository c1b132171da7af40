use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use serde::Deserialize;

use orgcentral_auth::abac::AbacPolicy;
use orgcentral_infra::use_cases::{get_abac_policies, set_abac_policies};

use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

#[derive(Debug, Deserialize)]
pub struct SetPoliciesRequest {
    pub policies: Vec<AbacPolicy>,
}

pub fn router() -> Router {
    Router::new().route("/policies", get(list_policies).put(replace_policies))
}

/// GET /org/abac/policies
pub async fn list_policies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match get_abac_policies(&services.abac, ctx.authorization()).await {
        Ok(policies) => (StatusCode::OK, Json(serde_json::json!({ "policies": policies }))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}

/// PUT /org/abac/policies - replace the whole policy list
pub async fn replace_policies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<SetPoliciesRequest>,
) -> axum::response::Response {
    match set_abac_policies(&services.abac, ctx.authorization(), body.policies).await {
        Ok(policies) => (StatusCode::OK, Json(serde_json::json!({ "policies": policies }))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}
