use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::sheets::SheetError;

/// Request-level failures surfaced to API clients as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Auth(String),
    #[error("User already exists")]
    UserExists,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Upstream(#[from] SheetError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_credentials() -> Self {
        AppError::Auth("Invalid credentials".to_string())
    }

    pub fn invalid_token() -> Self {
        AppError::Auth("Could not validate credentials".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::UserExists | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        match self {
            AppError::Auth(_) => (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response(),
            _ => (status, body).into_response(),
        }
    }
}
