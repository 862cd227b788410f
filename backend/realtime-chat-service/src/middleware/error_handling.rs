use crate::error::{AppError, ErrorCategory};
use actix_web::{http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};

/// Body of every failed HTTP response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
        }
    }
}

// map domain errors to HTTP responses
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if err.category() == ErrorCategory::Infrastructure {
        tracing::error!(error = %err, "request failed");
    }

    let response = ErrorResponse::new(
        match status {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::CONFLICT => "Conflict",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        },
        &err.public_message(),
        status.as_u16(),
        err.category().as_str(),
        err.code(),
    );

    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, response) = map_error(err);
    HttpResponse::build(status).json(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_mapping() {
        let (status, body) = map_error(&AppError::NotPending);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Conflict");
        assert_eq!(body.error_type, "conflict_error");
        assert_eq!(body.code, "NOT_PENDING");
    }

    #[test]
    fn test_database_error_is_opaque() {
        let (status, body) = map_error(&AppError::Database("relation users does not exist".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "internal server error");
        assert_eq!(body.code, "DATABASE_ERROR");
    }

    #[test]
    fn test_authorization_mapping() {
        let (status, body) = map_error(&AppError::NotMessageOwner);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error_type, "authorization_error");
    }
}
