//! Error types for the pdflock server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdflock_core::PdfLockError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Server error types
///
/// Only the `Display` text and validation problems reach the client.
/// Diagnostic detail from the core stays in the logs.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request")]
    Validation(Vec<String>),

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Route not found")]
    NotFound,

    #[error("{context}")]
    Processing {
        context: &'static str,
        #[source]
        source: PdfLockError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Wrap a core failure. Validation failures stay client errors.
    pub fn processing(context: &'static str, source: PdfLockError) -> Self {
        match source {
            PdfLockError::Validation(problems) => ServerError::Validation(problems),
            source => ServerError::Processing { context, source },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::MissingApiKey => StatusCode::UNAUTHORIZED,
            ServerError::InvalidApiKey => StatusCode::FORBIDDEN,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Processing { .. } | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Validation(vec![rejection.body_text()])
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ServerError::Validation(details) => ErrorResponse {
                success: false,
                error: "Invalid request".to_string(),
                details: Some(details),
                message: None,
            },
            ServerError::Processing { context, source } => ErrorResponse {
                success: false,
                error: context.to_string(),
                details: None,
                message: Some(source.to_string()),
            },
            ServerError::Internal(detail) => {
                error!(error = %detail, "Internal server error");
                ErrorResponse {
                    success: false,
                    error: "Internal server error".to_string(),
                    details: None,
                    message: None,
                }
            }
            other => ErrorResponse {
                success: false,
                error: other.to_string(),
                details: None,
                message: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
