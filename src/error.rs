use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::users::repo::StoreError;

/// Every failure a request can end with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Inactive user")]
    InactiveUser,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// In-band result envelope shared by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusMessage {
    pub status_code: u16,
    pub message: String,
}

impl StatusMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::PasswordMismatch => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::RevokedToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AccountDisabled | AppError::InactiveUser => StatusCode::FORBIDDEN,
            AppError::EmailAlreadyExists => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Something went wrong!".into(),
            AppError::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("User"),
            StoreError::DuplicateEmail => AppError::EmailAlreadyExists,
            StoreError::Backend(e) => AppError::Internal(e.context("user store")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Storage(e) => error!(error = ?e, "storage failure"),
            AppError::Internal(e) => error!(error = ?e, "internal error"),
            _ => {}
        }
        let message = self.public_message();
        let body = StatusMessage {
            status_code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
