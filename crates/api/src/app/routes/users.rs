use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use docflow_core::UserId;
use docflow_identity::UserCommand;
use docflow_identity::user::{ApproveUser, AssignRole, DisableUser, RevokeRole, SetDepartment};
use docflow_org::RoleId;

use crate::app::routes::common::require_role;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/:id/approve", post(approve_user))
        .route("/:id/disable", post(disable_user))
        .route("/:id/department", post(set_department))
        .route(
            "/:id/roles/:role",
            post(assign_role).delete(revoke_role),
        )
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }
    let users = services.users().all();
    (StatusCode::OK, Json(serde_json::json!({ "users": users }))).into_response()
}

pub async fn approve_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let user_id = UserId::from_uuid(id);
    let result = services.dispatch_user(
        user_id,
        UserCommand::Approve(ApproveUser {
            user_id,
            occurred_at: Utc::now(),
        }),
    );

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn disable_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::DisableUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let user_id = UserId::from_uuid(id);
    let result = services.dispatch_user(
        user_id,
        UserCommand::Disable(DisableUser {
            user_id,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
    );

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn set_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::SetUserDepartmentRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    // Membership must reference a real department.
    if let Some(department) = body.department {
        if services.departments().department(department).is_none() {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown department");
        }
    }

    let user_id = UserId::from_uuid(id);
    let result = services.dispatch_user(
        user_id,
        UserCommand::SetDepartment(SetDepartment {
            user_id,
            department: body.department,
            occurred_at: Utc::now(),
        }),
    );

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path((id, role)): Path<(Uuid, Uuid)>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let role = RoleId::from_uuid(role);
    if services.roles().role(role).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown role");
    }

    let user_id = UserId::from_uuid(id);
    let result = services.dispatch_user(
        user_id,
        UserCommand::AssignRole(AssignRole {
            user_id,
            role,
            occurred_at: Utc::now(),
        }),
    );

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path((id, role)): Path<(Uuid, Uuid)>,
) -> axum::response::Response {
    if let Err(resp) = require_role(&ctx, "admin") {
        return resp;
    }

    let user_id = UserId::from_uuid(id);
    let result = services.dispatch_user(
        user_id,
        UserCommand::RevokeRole(RevokeRole {
            user_id,
            role: RoleId::from_uuid(role),
            occurred_at: Utc::now(),
        }),
    );

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
