use axum::http::StatusCode;

use crate::app::errors;
use crate::context::AuthContext;

/// Gate an administrative handler on a role name from the caller's context.
pub fn require_role(ctx: &AuthContext, role: &str) -> Result<(), axum::response::Response> {
    if ctx.has_role(role) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("requires the {role} role"),
        ))
    }
}
