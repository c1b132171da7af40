use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    let session = ctx.session();
    let auth = ctx.authorization();
    Json(serde_json::json!({
        "orgId": auth.org_id(),
        "orgSlug": session.organization.slug,
        "userId": auth.user_id(),
        "role": auth.role_key(),
        "roleName": auth.role_name(),
        "dataClassification": auth.data_classification(),
        "dataResidency": auth.data_residency(),
        "mfaVerified": auth.mfa_verified(),
        "requiresMfa": auth.requires_mfa(),
        "correlationId": auth.correlation_id(),
    }))
}
