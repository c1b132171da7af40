use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};

use orgcentral_auth::{CacheMode, cache_mode_for};
use orgcentral_infra::use_cases::get_employee_profile_cached;

use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/profiles/:id", get(get_profile))
}

/// GET /hr/profiles/:id
pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let auth = ctx.authorization();
    match get_employee_profile_cached(&services.profiles, auth, &id).await {
        Ok(profile) => {
            let mut response = (StatusCode::OK, Json(profile)).into_response();
            // Downstream HTTP caches must honour the same classification floor.
            let cache_control = match cache_mode_for(auth) {
                CacheMode::Shared => "private, max-age=0",
                CacheMode::NoStore => "no-store",
            };
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
            response
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}
