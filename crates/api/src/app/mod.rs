//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: in-memory repositories, cache, audit sink and use-case deps
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use orgcentral_infra::clock::{Clock, SystemClock};

use crate::config::ApiConfig;
use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: ApiConfig) -> anyhow::Result<Router> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = Arc::new(services::build_services(config, clock.clone()));
    if services.config.seed_demo {
        services.seed_demo(clock.now()).await?;
    }
    Ok(router_with_services(services))
}

/// Router over already-built services; tests seed the stores first.
pub fn router_with_services(services: Arc<services::AppServices>) -> Router {
    // Protected routes: require a resolved session + org context.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            services,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
