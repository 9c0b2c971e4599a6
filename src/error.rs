use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::backend::BackendError;
use crate::policy::{
    booking::BookingError, lifecycle::LifecycleError, provisioning::ProvisioningError,
    session::AccessError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Email or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden("FORBIDDEN", message.into())
    }

    pub fn appointment_not_found() -> Self {
        ApiError::NotFound("NOT_FOUND", "appointment not found".into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        tracing::warn!(error = ?e, "backend call failed");
        match e {
            BackendError::InvalidCredentials => ApiError::invalid_credentials(),
            BackendError::Rejected(msg) => ApiError::BadRequest("BACKEND_REJECTED", msg),
            BackendError::Conflict(msg) => ApiError::Conflict("BACKEND_CONFLICT", msg),
            BackendError::Unavailable(msg) => {
                ApiError::Internal(msg.unwrap_or_else(|| "backend request failed".into()))
            }
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        tracing::warn!(error = %e, "access refused");
        ApiError::Forbidden("NO_PROFILE", "No profile is associated with this account".into())
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        ApiError::validation(e.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        let message = e.to_string();
        match e {
            LifecycleError::AlreadyCancelled => ApiError::Conflict("ALREADY_CANCELLED", message),
            LifecycleError::Terminal => ApiError::Conflict("STATUS_TERMINAL", message),
            LifecycleError::InPast => ApiError::Forbidden("CANCEL_NOT_ALLOWED", message),
            LifecycleError::UseCancelAction => ApiError::validation(message),
        }
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(e: ProvisioningError) -> Self {
        let message = e.to_string();
        match e {
            ProvisioningError::NotSuperAdmin => ApiError::forbidden(message),
            ProvisioningError::SelfDeletion => ApiError::Forbidden("SELF_DELETION", message),
            ProvisioningError::MissingFields
            | ProvisioningError::InvalidEmail
            | ProvisioningError::RoleNotAssignable(_) => ApiError::validation(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}
