//! Response envelope and error mapping for the REST surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, WorkflowError};

/// Envelope every REST response is wrapped in.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
            data: Some(data),
            error_code: None,
            details: None,
        }
    }
}

impl ApiResponse<Value> {
    pub fn error(
        message: impl Into<String>,
        error_code: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: Utc::now(),
            data: None,
            error_code: Some(error_code.into()),
            details,
        }
    }
}

/// Error wrapper that renders as an envelope with the right status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            error_code: "BAD_REQUEST".into(),
            details: None,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, error_code) = match &err {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::Workflow(w) if w.is_not_found() => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Workflow(WorkflowError::NotActive { .. }) => {
                (StatusCode::CONFLICT, "WORKFLOW_NOT_ACTIVE")
            }
            Error::Workflow(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Error::Executor(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXECUTION_ERROR"),
            Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
        };
        Self {
            status,
            message: err.to_string(),
            error_code: error_code.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::error(self.message, self.error_code, self.details);
        (self.status, Json(body)).into_response()
    }
}
