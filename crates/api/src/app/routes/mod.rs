use axum::{Router, routing::get};

pub mod auth;
pub mod common;
pub mod documents;
pub mod notifications;
pub mod org;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/org", org::router())
        .nest("/users", users::router())
        .nest("/documents", documents::router())
        .nest("/document-types", documents::types_router())
        .nest("/notifications", notifications::router())
}
