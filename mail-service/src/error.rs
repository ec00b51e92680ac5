//! Error types for mail-service
//!
//! Every component owns a narrow error enum; [`ServiceError`] folds them into
//! the categories the HTTP layer reports.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::attachments::UploadError;
use crate::validator::ValidationError;

/// Result type alias for request handling
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Service error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing or malformed input, reported to the caller verbatim
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Body could not be decoded into the endpoint's schema
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    /// Attachment upload failure
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Mail transport, fetch target or template engine failure.
    /// `message` is shown to the caller, `detail` only goes to the log.
    #[error("{message}: {detail}")]
    Dependency { message: &'static str, detail: String },

    /// No route for the request
    #[error("Endpoint not found")]
    NotFound,

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body: `{ "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

impl ServiceError {
    /// Wrap a collaborator failure behind a fixed public message
    pub fn dependency(message: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Dependency {
            message,
            detail: detail.to_string(),
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upload(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Dependency { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Message safe to return to the caller
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::BadRequest(_) => self.to_string(),
            Self::Upload(e) if e.is_client_error() => e.to_string(),
            Self::Upload(_) => "File upload failed".to_string(),
            Self::Dependency { message, .. } => message.to_string(),
            Self::NotFound => "Endpoint not found".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, Json(ApiError::new(&self.public_message()))).into_response()
    }
}
