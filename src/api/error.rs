use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::StudyError;

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl StudyError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            StudyError::NotFound(_) => StatusCode::NOT_FOUND,
            StudyError::Forbidden(_) => StatusCode::FORBIDDEN,
            StudyError::Busy(_) | StudyError::ComputationRunning(_) => StatusCode::CONFLICT,
            StudyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            StudyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            StudyError::NotFound(_) => "NotFound",
            StudyError::Forbidden(_) => "Forbidden",
            StudyError::Busy(_) => "Busy",
            StudyError::ComputationRunning(_) => "ComputationRunning",
            StudyError::Upstream(_) => "UpstreamFailure",
            StudyError::Internal(_) => "InternalServerError",
        }
    }
}

impl IntoResponse for StudyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let message = match &self {
            StudyError::Internal(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            StudyError::Upstream(_) => {
                tracing::warn!(error = %self, "Upstream service failure");
                self.to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            StudyError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StudyError::Forbidden("test".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            StudyError::Busy("test".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            StudyError::ComputationRunning("test".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            StudyError::Upstream("test".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_types() {
        assert_eq!(
            StudyError::NotFound("test".to_string()).error_type(),
            "NotFound"
        );
        assert_eq!(
            StudyError::Busy("test".to_string()).error_type(),
            "Busy"
        );
    }

    #[test]
    fn test_error_display() {
        let error = StudyError::NotFound("node 123".to_string());
        assert_eq!(error.to_string(), "Not found: node 123");
    }
}
