use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::AuthContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    let user = ctx.user();
    Json(serde_json::json!({
        "user_id": user.user_id.to_string(),
        "username": user.username,
        "display_name": user.display_name,
        "department": user.department.map(|d| d.to_string()),
        "roles": ctx.role_names(),
    }))
}
