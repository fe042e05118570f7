use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use docflow_core::UserId;
use docflow_identity::user::RegisterUser;
use docflow_identity::{TokenPair, UserCommand};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/register", post(register))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let (user, pair) = match services.access().login(&body.username, body.remember) {
        Ok(v) => v,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let roles = services.roles().role_names(&user.roles);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "user": {
                "user_id": user.user_id.to_string(),
                "username": user.username,
                "display_name": user.display_name,
                "department": user.department.map(|d| d.to_string()),
                "roles": roles,
            },
            "tokens": token_body(&pair),
        })),
    )
        .into_response()
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RefreshRequest>,
) -> axum::response::Response {
    match services.access().refresh(&body.refresh_token) {
        Ok(pair) => (StatusCode::OK, Json(token_body(&pair))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Self-service registration; the account stays pending until an
/// administrator approves it.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    // Usernames are unique across accounts; the aggregate cannot see other
    // streams, so the read model is the uniqueness authority.
    if services.users().by_username(body.username.trim()).is_some() {
        return errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            "username is already taken",
        );
    }

    let user_id = UserId::new();
    let command = UserCommand::Register(RegisterUser {
        user_id,
        username: body.username,
        display_name: body.display_name,
        requested_status: None,
        roles: BTreeSet::new(),
        baseline_role: services.baseline_role(),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch_user(user_id, command) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "user_id": user_id.to_string(),
            "status": "pending_approval",
        })),
    )
        .into_response()
}

fn token_body(pair: &TokenPair) -> serde_json::Value {
    serde_json::json!({
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "access_expires_at": pair.access_expires_at,
        "refresh_expires_at": pair.refresh_expires_at,
    })
}
