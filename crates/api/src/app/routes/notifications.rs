use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use docflow_notify::{NotificationId, Page};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).delete(delete_all))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(read_all))
        .route("/:id/read", post(mark_read))
        .route("/:id", delete(soft_delete))
}

fn page_of(query: &dto::PageQuery) -> Page {
    Page {
        offset: query.offset,
        limit: query.limit.unwrap_or(Page::default().limit),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let inbox = services.notifications();
    let page = page_of(&query);

    let rows = match query.kind {
        Some(kind) => inbox.list_by_type(ctx.user_id(), kind, page),
        None => inbox.list_for_user(ctx.user_id(), page),
    };

    match rows {
        Ok(rows) => (
            StatusCode::OK,
            Json(serde_json::json!({ "notifications": rows })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn unread_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    match services.notifications().unread_count(ctx.user_id()) {
        Ok(count) => (
            StatusCode::OK,
            Json(serde_json::json!({ "unread": count })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let result = services
        .notifications()
        .mark_read(ctx.user_id(), NotificationId::from_uuid(id));

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn read_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    match services.notifications().mark_all_read(ctx.user_id()) {
        Ok(touched) => (
            StatusCode::OK,
            Json(serde_json::json!({ "marked": touched })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn soft_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let result = services
        .notifications()
        .soft_delete(ctx.user_id(), NotificationId::from_uuid(id));

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    match services.notifications().soft_delete_all(ctx.user_id()) {
        Ok(hidden) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": hidden })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
