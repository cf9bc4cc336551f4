use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Forbidden(_) => 403,
            AppError::Config(_) | AppError::Database(_) => 500,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Forbidden(_) => "authorization_error",
            _ => "server_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        // Database details stay in the logs.
        let message = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error while serving request");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(ResponseError::status_code(self)).json(ErrorBody {
            error: self.error_type(),
            message,
            status: AppError::status_code(self),
        })
    }
}

/// Why a handshake frame was refused. The connection is closed and nothing
/// is registered.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("handshake frame has no sender identity")]
    MissingIdentity,

    #[error("handshake frame must be text")]
    NotText,

    #[error("handshake token rejected: {0}")]
    Token(String),
}

impl HandshakeError {
    /// Label used for the handshake outcome metric.
    pub fn label(&self) -> &'static str {
        match self {
            HandshakeError::Malformed(_) => "malformed",
            HandshakeError::MissingIdentity => "missing_identity",
            HandshakeError::NotText => "not_text",
            HandshakeError::Token(_) => "token_rejected",
        }
    }
}

/// Frame errors after the handshake. Each one ends the offending connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("binary frames are not supported")]
    Binary,

    #[error("frame claims sender {claimed} on a connection owned by {owner}")]
    SenderMismatch { claimed: String, owner: String },

    #[error("message pipeline is closed")]
    PipelineClosed,
}

/// A write to a live connection failed because its actor is gone.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    ConnectionClosed(String),

    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}
