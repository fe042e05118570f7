//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (event store/bus, projections, dispatcher)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(jwt_secret: String) -> Router {
    let services = Arc::new(services::build_services(jwt_secret.as_bytes()));

    // Login, refresh and registration happen before a bearer token exists.
    let public = routes::auth::router().layer(Extension(services.clone()));

    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            services,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(public)
        .merge(protected)
        .layer(ServiceBuilder::new())
}
