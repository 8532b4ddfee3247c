// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("M-Pesa authentication failed: {0}")]
    UpstreamAuth(String),

    #[error("Unexpected M-Pesa response: {0}")]
    UpstreamProtocol(String),

    #[error("M-Pesa error: {0}")]
    Mpesa(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Payment store error: {0}")]
    Store(String),

    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::UpstreamAuth(_) => (StatusCode::BAD_GATEWAY, "M-Pesa authentication failed"),
            AppError::UpstreamProtocol(_) => (StatusCode::BAD_GATEWAY, "Unexpected M-Pesa response"),
            AppError::Mpesa(_) => (StatusCode::BAD_GATEWAY, "M-Pesa error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            AppError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error"),
            AppError::Store(_) | AppError::MongoDB(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            AppError::HttpClient(_) => (StatusCode::INTERNAL_SERVER_ERROR, "HTTP client error"),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpClient(format!("HTTP request failed: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl AppError {
    pub fn upstream_auth(msg: impl Into<String>) -> Self {
        AppError::UpstreamAuth(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        AppError::UpstreamProtocol(msg.into())
    }

    pub fn mpesa(msg: impl Into<String>) -> Self {
        AppError::Mpesa(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        AppError::Store(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
