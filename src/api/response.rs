use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Always true; failures go through `ApiError`
    pub success: bool,
    pub data: T,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

/// Additional metadata about the response
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Total count of items (for listings)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    /// Calculation time in microseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_us: Option<u64>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Add total count to metadata
    pub fn with_count(mut self, count: usize) -> Self {
        self.metadata.get_or_insert_with(Default::default).total_count = Some(count);
        self
    }

    /// Add processing duration to metadata
    pub fn with_duration_us(mut self, duration_us: u64) -> Self {
        self.metadata.get_or_insert_with(Default::default).duration_us = Some(duration_us);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, "test data");
        assert!(response.metadata.is_none());
    }

    #[test]
    fn test_response_with_metadata() {
        let response = ApiResponse::success("data").with_count(58).with_duration_us(40);

        let metadata = response.metadata.unwrap();
        assert_eq!(metadata.total_count, Some(58));
        assert_eq!(metadata.duration_us, Some(40));
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let json = serde_json::to_value(ApiResponse::success(1).with_count(3)).unwrap();
        assert_eq!(json["metadata"]["totalCount"], 3);
        assert!(json["metadata"].get("durationUs").is_none());
    }
}
