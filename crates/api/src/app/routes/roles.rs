use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};

use orgcentral_core::RoleId;
use orgcentral_infra::use_cases::{
    RoleDefinition, RoleDefinitionPatch, create_role, list_roles, update_role,
};

use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", patch(update))
}

/// GET /org/roles
pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match list_roles(&services.roles, ctx.authorization()).await {
        Ok(roles) => (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}

/// POST /org/roles
pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(definition): Json<RoleDefinition>,
) -> axum::response::Response {
    match create_role(&services.roles, ctx.authorization(), definition).await {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}

/// PATCH /org/roles/:id
pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(patch): Json<RoleDefinitionPatch>,
) -> axum::response::Response {
    match update_role(&services.roles, ctx.authorization(), &RoleId::new(id), patch).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(err) => errors::domain_error_to_response(err),
    }
}
