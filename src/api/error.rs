//! API error responses.
//!
//! Every failure is returned as `{"error": "<message>"}` with a status code
//! chosen by the kind of failure.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::engine::ServiceError;

/// The error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Unauthorized error (401) - missing or unusable credentials
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Forbidden error (403) - authenticated but wrong role
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "access denied")
    }

    /// Conflict error (409)
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Internal server error (500); details belong in the logs, not the body
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    /// Request timeout (408)
    pub fn timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "request timeout")
    }

    pub fn invalid_body() -> Self {
        Self::bad_request("invalid request body")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            error: self.message,
        };

        (self.status, Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidRole
            | ServiceError::InvalidEmail
            | ServiceError::InvalidCity
            | ServiceError::InvalidProductType
            | ServiceError::InvalidPickupPoint(_)
            | ServiceError::OpenReceptionAlreadyExists
            | ServiceError::NoOpenReception
            | ServiceError::NoProducts => ApiError::bad_request(message),
            ServiceError::UserExists => ApiError::conflict(message),
            ServiceError::InvalidCredentials
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired => ApiError::unauthorized(message),
            ServiceError::Internal(_) => ApiError::internal(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        ApiError::invalid_body()
    }
}

/// Unwrap a JSON body, mapping every extraction failure to `invalid request body`
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_service_error_status_codes() {
        let cases = [
            (ServiceError::InvalidRole, StatusCode::BAD_REQUEST),
            (ServiceError::InvalidCity, StatusCode::BAD_REQUEST),
            (
                ServiceError::InvalidPickupPoint(Uuid::nil()),
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::NoProducts, StatusCode::BAD_REQUEST),
            (ServiceError::UserExists, StatusCode::CONFLICT),
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ServiceError::TokenExpired, StatusCode::UNAUTHORIZED),
            (
                ServiceError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(ServiceError::Internal("disk on fire".to_string()));
        assert_eq!(err.message(), "internal server error");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiError::from(ServiceError::NoOpenReception).message(),
            "no open reception exists"
        );
        assert_eq!(
            ApiError::from(ServiceError::InvalidPickupPoint(Uuid::nil())).message(),
            "invalid pvz id"
        );
        assert_eq!(ApiError::forbidden().message(), "access denied");
    }
}
