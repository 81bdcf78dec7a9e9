//! API error → HTTP response mapping.

use hyper::StatusCode;
use serde_json::json;

use curator_queue::QueueError;

use crate::BoxBody;

/// An error ready to serialize as `{"detail": ...}` with its status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }

    pub fn into_response(self) -> hyper::Response<BoxBody> {
        let body = json!({ "detail": self.detail }).to_string();
        hyper::Response::builder()
            .status(self.status)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(crate::full_body(body))
            .unwrap_or_else(|_| {
                hyper::Response::new(crate::full_body("{\"detail\":\"internal error\"}"))
            })
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidInput(detail) => ApiError::bad_request(detail),
            QueueError::NotFound(_) => ApiError::not_found("Task not found"),
            QueueError::Store(err) => ApiError::internal(err.to_string()),
        }
    }
}
