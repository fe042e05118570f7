use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use docflow_core::DomainError;
use docflow_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        DispatchError::Unauthenticated(msg) => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", msg)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::InvalidHierarchy(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_hierarchy", msg)
        }
        DispatchError::InvalidTransition(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", msg)
        }
        DispatchError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    dispatch_error_to_response(DispatchError::from(err))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
