use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use docflow_core::AggregateId;
use docflow_documents::{DocumentId, DocumentTypeId};

use crate::app::routes::common::require_role;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(inbox).post(create_document))
        .route("/summary", get(summary))
        .route("/:id", get(get_document))
        .route("/:id/assign", post(assign_document))
        .route("/:id/actions", post(record_action))
        .route("/:id/type", post(set_document_type))
        .route("/:id/advance", post(advance_stage))
}

pub fn types_router() -> Router {
    Router::new().route("/", get(list_types).post(register_type))
}

fn document_id(raw: Uuid) -> DocumentId {
    DocumentId::from(AggregateId::from(raw))
}

/// Documents currently awaiting the caller, newest activity first.
pub async fn inbox(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    let rows = match services.classification().inbox_for(ctx.user_id()) {
        Ok(rows) => rows,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let documents: Vec<_> = rows
        .into_iter()
        .map(|(document, classification)| {
            serde_json::json!({
                "document": document,
                "classification": classification,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "documents": documents })),
    )
        .into_response()
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    match services.classification().summary_for(ctx.user_id()) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let id = document_id(id);
    let Some(document) = services.workflow().document(id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown document");
    };
    let classification = match services.classification().classify_for(id, ctx.user_id()) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "document": document,
            "classification": classification,
        })),
    )
        .into_response()
}

pub async fn create_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateDocumentRequest>,
) -> axum::response::Response {
    let created = services.workflow().create_document(
        body.title,
        ctx.user_id(),
        body.security_level,
        body.distribution,
        body.due_at,
    );

    match created {
        Ok(document) => (StatusCode::CREATED, Json(document)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn assign_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::AssignDocumentRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    // Routing targets must resolve before the aggregate sees the command.
    if let Some(department) = body.department {
        if services.departments().department(department).is_none() {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown department");
        }
    }
    if let Some(handler) = body.handler {
        if services.users().by_id(handler).is_none() {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown handler");
        }
    }

    let result = services
        .workflow()
        .assign_document(document_id(id), body.department, body.handler);

    match result {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::RecordActionRequest>,
) -> axum::response::Response {
    let scope = match services.classification().scope_for(ctx.user_id()) {
        Ok(scope) => scope,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let result =
        services
            .workflow()
            .record_action(document_id(id), scope, body.state, body.comment);

    match result {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn set_document_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::SetDocumentTypeRequest>,
) -> axum::response::Response {
    let scope = match services.classification().scope_for(ctx.user_id()) {
        Ok(scope) => scope,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let result = services.workflow().set_document_type(
        document_id(id),
        DocumentTypeId::from_uuid(body.document_type),
        scope,
        body.comment,
    );

    match result {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn advance_stage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let scope = match services.classification().scope_for(ctx.user_id()) {
        Ok(scope) => scope,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.workflow().advance_stage(document_id(id), scope) {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document types (reference data)
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_types(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let types = services.registry().list();
    (StatusCode::OK, Json(serde_json::json!({ "types": types }))).into_response()
}

pub async fn register_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::RegisterDocumentTypeRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let id = services.registry().register(body.name);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "document_type_id": id.to_string() })),
    )
        .into_response()
}
