use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;
use uuid::Uuid;

use docflow_core::DepartmentId;
use docflow_org::department::{CreateDepartment, DirectoryCommand, RenameDepartment, ReparentDepartment};
use docflow_org::role::{
    CreatePermission, CreateRole, DeleteRole, GrantPermission, RenameRole, RevokePermission,
    RoleCatalogCommand,
};
use docflow_org::{PermissionId, RoleId};

use crate::app::routes::common::require_role;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/departments", get(list_departments).post(create_department))
        .route("/departments/:id/children", get(department_children))
        .route("/departments/:id/rename", post(rename_department))
        .route("/departments/:id/reparent", post(reparent_department))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", delete(delete_role))
        .route("/roles/:id/rename", post(rename_role))
        .route(
            "/roles/:id/permissions/:perm",
            post(grant_permission).delete(revoke_permission),
        )
        .route("/permissions", get(list_permissions).post(create_permission))
}

// ─────────────────────────────────────────────────────────────────────────────
// Departments
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_departments(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let roots = services.departments().roots();
    (StatusCode::OK, Json(serde_json::json!({ "roots": roots }))).into_response()
}

pub async fn department_children(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let id = DepartmentId::from_uuid(id);
    let departments = services.departments();
    if departments.department(id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown department");
    }
    let children = departments.children_of(id);
    (
        StatusCode::OK,
        Json(serde_json::json!({ "children": children })),
    )
        .into_response()
}

pub async fn create_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateDepartmentRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let department_id = DepartmentId::new();
    let result = services.dispatch_directory(DirectoryCommand::Create(CreateDepartment {
        department_id,
        name: body.name,
        parent: body.parent,
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "department_id": department_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn rename_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::RenameRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let result = services.dispatch_directory(DirectoryCommand::Rename(RenameDepartment {
        department_id: DepartmentId::from_uuid(id),
        name: body.name,
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reparent_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::ReparentRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let result = services.dispatch_directory(DirectoryCommand::Reparent(ReparentDepartment {
        department_id: DepartmentId::from_uuid(id),
        new_parent: body.parent,
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles and permissions
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let roles = services.roles().all_roles();
    (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response()
}

pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let permissions = services.roles().all_permissions();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "permissions": permissions })),
    )
        .into_response()
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let role_id = RoleId::new();
    let permissions: BTreeSet<PermissionId> = body
        .permissions
        .into_iter()
        .map(PermissionId::from_uuid)
        .collect();

    let result = services.dispatch_catalog(RoleCatalogCommand::CreateRole(CreateRole {
        role_id,
        name: body.name,
        owner: ctx.user_id(),
        permissions,
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "role_id": role_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn rename_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::RenameRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let result = services.dispatch_catalog(RoleCatalogCommand::RenameRole(RenameRole {
        role_id: RoleId::from_uuid(id),
        name: body.name,
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let role_id = RoleId::from_uuid(id);
    // The catalog cannot see user↔role assignments; resolve the count here.
    let assigned_users = services.users().count_with_role(role_id);

    let result = services.dispatch_catalog(RoleCatalogCommand::DeleteRole(DeleteRole {
        role_id,
        assigned_users,
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path((id, perm)): Path<(Uuid, Uuid)>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let result = services.dispatch_catalog(RoleCatalogCommand::GrantPermission(GrantPermission {
        role_id: RoleId::from_uuid(id),
        permission_id: PermissionId::from_uuid(perm),
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path((id, perm)): Path<(Uuid, Uuid)>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let result = services.dispatch_catalog(RoleCatalogCommand::RevokePermission(RevokePermission {
        role_id: RoleId::from_uuid(id),
        permission_id: PermissionId::from_uuid(perm),
        occurred_at: Utc::now(),
    }));

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreatePermissionRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let permission_id = PermissionId::new();
    let result =
        services.dispatch_catalog(RoleCatalogCommand::CreatePermission(CreatePermission {
            permission_id,
            name: body.name,
            category: body.category,
            owner: ctx.user_id(),
            occurred_at: Utc::now(),
        }));

    match result {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "permission_id": permission_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
