use axum::{Router, routing::get};

pub mod abac;
pub mod authorization;
pub mod hr;
pub mod roles;
pub mod system;

/// Router for all authenticated (org-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/org/session", get(system::whoami))
        .nest("/org/abac", abac::router())
        .nest("/org/authorization", authorization::router())
        .nest("/org/roles", roles::router())
        .nest("/hr", hr::router())
}
