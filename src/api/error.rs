use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::tariff::TariffError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("{0}")]
    InvalidCombination(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl ApiError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::InvalidCombination(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError { .. } => "ValidationError",
            ApiError::InvalidCombination(_) => "InvalidCombination",
            ApiError::InternalError(_) => "InternalServerError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let message = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let field = match self {
            ApiError::ValidationError { field, .. } => field,
            _ => None,
        };

        let error_response = ErrorResponse {
            success: false,
            error: error_type.to_string(),
            message,
            field,
            timestamp: chrono::Utc::now(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<TariffError> for ApiError {
    fn from(error: TariffError) -> Self {
        match &error {
            TariffError::InvalidCombination { .. } => {
                ApiError::InvalidCombination(error.to_string())
            }
            TariffError::MissingField(_)
            | TariffError::InvalidMagnitude { .. }
            | TariffError::NonNumeric { .. }
            | TariffError::AmountOverflow { .. } => {
                ApiError::ValidationError {
                    field: error.field().map(str::to_string),
                    message: error.to_string(),
                }
            }
            TariffError::MalformedKey(_) => ApiError::BadRequest(error.to_string()),
            TariffError::CatalogIntegrity { .. } => ApiError::InternalError(error.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::InternalError(error.to_string())
    }
}
