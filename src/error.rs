//! Service error taxonomy.
//!
//! Three families: configuration (engine missing), input (bad upload, bad
//! language), processing (engine or document generation failed). Each maps to
//! an HTTP status and a JSON `{"detail": ...}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Tesseract binary could not be located (configuration error).
    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    /// Malformed multipart body or missing required field.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Upload was present but contained no bytes.
    #[error("empty upload")]
    EmptyUpload,

    /// Uploaded bytes could not be decoded as an image.
    #[error("unsupported or corrupt image: {0}")]
    InvalidImage(String),

    /// The engine rejected the requested language pack.
    #[error("unknown OCR language: {0}")]
    InvalidLanguage(String),

    /// The engine ran but failed.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// DOCX serialization failed.
    #[error("document generation failed: {0}")]
    Docx(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::EmptyUpload => StatusCode::BAD_REQUEST,
            ApiError::InvalidImage(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::InvalidLanguage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::EngineUnavailable(_)
            | ApiError::Ocr(_)
            | ApiError::Docx(_)
            | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}
