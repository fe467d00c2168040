//! Error types for jbox-server
//!
//! Core queue/quota failures are wrapped so handlers can propagate them with
//! `?`; [`IntoResponse`] maps each kind to an HTTP status and a JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::queue::QueueError;
use crate::quota::QuotaError;

/// Main error type for jbox-server
#[derive(Error, Debug)]
pub enum Error {
    /// Queue operation rejected
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Quota denial or unknown operation kind
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Errors from the shared library (config, input validation)
    #[error(transparent)]
    Common(#[from] jbox_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller lacks host privileges (or does not own the resource)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience Result type using jbox-server Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Queue(QueueError::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Queue(QueueError::IndexOutOfRange { .. }) => StatusCode::BAD_REQUEST,
            Error::Quota(QuotaError::UnknownOperation(_)) => StatusCode::BAD_REQUEST,
            Error::Quota(QuotaError::WindowTooLong { .. }) => StatusCode::BAD_REQUEST,
            Error::Quota(QuotaError::Exceeded { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Error::Common(jbox_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Common(jbox_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Error::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Http(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Error::Quota(QuotaError::Exceeded {
                operation,
                current,
                max,
                window_secs,
                wait_secs,
                ..
            }) => json!({
                "success": false,
                "error": self.to_string(),
                "operation": operation,
                "current": current,
                "max": max,
                "window_secs": window_secs,
                "wait_secs": wait_secs,
            }),
            _ => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
