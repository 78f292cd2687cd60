//! Error types for Gutachten services
//!
//! Fatal errors abort a submission and surface to the HTTP caller:
//! - Distinct error types for the fatal failure modes
//! - HTTP status code mapping
//! - German user-facing message, internal cause for logs
//!
//! Non-fatal stage errors live next to their collaborators
//! ([`crate::storage::UploadError`], [`crate::records::RecordKeeperError`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    MissingField,
    InvalidPayload,

    // Document errors (2xxx)
    RenderFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::MissingField => 1001,
            ErrorCode::InvalidPayload => 1002,
            ErrorCode::RenderFailed => 2001,
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Fatal submission errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    #[error("Document rendering failed: {message}")]
    Render { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidPayload { .. } => ErrorCode::InvalidPayload,
            AppError::Render { .. } => ErrorCode::RenderFailed,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// The form frontend only distinguishes success from failure, so a
    /// rejected submission is reported as a server error like any other.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::MissingField { .. }
            | AppError::Render { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the person filling in the form
    pub fn user_message(&self) -> String {
        match self {
            AppError::MissingField { field } => format!("Pflichtfeld fehlt: {}", field),
            AppError::InvalidPayload { .. } => "Ungültige Formulardaten".to_string(),
            AppError::Render { .. } => "Das PDF-Gutachten konnte nicht erstellt werden".to_string(),
            AppError::Internal { .. } | AppError::Configuration { .. } => {
                "Beim Verarbeiten des Gutachtens ist ein Fehler aufgetreten".to_string()
            }
        }
    }

    /// Check if this error is a rejected submission rather than a fault
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::MissingField { .. } | AppError::InvalidPayload { .. })
    }
}

/// Body returned for a failed submission
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        if self.is_validation() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Submission rejected"
            );
        } else {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Submission failed"
            );
        }

        let body = ErrorResponse {
            success: false,
            message: self.user_message(),
            code,
        };

        (status, Json(body)).into_response()
    }
}
