use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum FileGatewayError {
    #[error("No file provided")]
    MissingFile,

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Unsupported file type: {0} (allowed: PNG, JPEG, GIF, WebP)")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Access to this path is forbidden")]
    Forbidden,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileGatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFile => "MISSING_FILE",
            Self::EmptyFile => "EMPTY_FILE",
            Self::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::Multipart(_) => "MALFORMED_UPLOAD",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Message safe to show to clients. Filesystem details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Io(_) => "Failed to access file storage".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for FileGatewayError {
    fn into_response(self) -> Response {
        if let FileGatewayError::Io(err) = &self {
            error!(error = %err, "file gateway io failure");
        }

        let body = ErrorResponse {
            error: self.public_message(),
            code: self.error_code(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}
