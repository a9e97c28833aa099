use std::borrow::Cow;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    auth::{jwt::TokenError, password::CodecError},
    envelope::Envelope,
    store::StoreError,
};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum ConflictKind {
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already exists")]
    EmailTaken,
    #[error("{0} already exists")]
    Duplicate(String),
}

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("Unauthorized")]
    MissingToken,
    #[error("Unauthorized: {0}")]
    InvalidToken(TokenError),
    #[error("Invalid credentials")]
    BadCredentials,
}

/// Every failure a handler can report. Converted into an [`Envelope`] at the
/// HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Conflict(#[from] ConflictKind),
    #[error(transparent)]
    Auth(#[from] AuthFailure),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Request timed out")]
    Timeout,
    #[error("storage failure: {0}")]
    Storage(StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Storage(_) | AppError::Codec(_) | AppError::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the caller. Internal failures keep their detail in logs only.
    pub fn public_message(&self) -> Cow<'static, str> {
        match self {
            AppError::Storage(_) => "Storage failure".into(),
            AppError::Codec(_) => "Unable to process password".into(),
            AppError::Token(_) => "Unable to issue session token".into(),
            other => other.to_string().into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => AppError::Conflict(match field.as_str() {
                "username" => ConflictKind::UsernameTaken,
                "email" => ConflictKind::EmailTaken,
                _ => ConflictKind::Duplicate(field),
            }),
            other => AppError::Storage(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Please send valid body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(format!("Please send valid path: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        Envelope::<()>::new(status, self.public_message(), None).into_response()
    }
}
