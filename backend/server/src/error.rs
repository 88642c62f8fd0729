use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use remote::RemoteError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures shown to the visitor verbatim.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Username must be 3-16 letters, digits or underscores")]
    InvalidUsername,

    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("Username and password are required")]
    MissingCredentials,

    #[error("{0}")]
    Rejected(String),
}

impl From<RemoteError> for AuthError {
    fn from(e: RemoteError) -> Self {
        AuthError::Rejected(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Forbidden")]
    Forbidden,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MalformedPayload(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Remote(RemoteError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
