use std::borrow::Cow;

use axum::{
    extract::{FromRequest, FromRequestParts, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::AppError;

/// Uniform response body: `{ status, message, data }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub message: Cow<'static, str>,
    pub data: Option<T>,
}

pub type ApiResult<T> = Result<Envelope<T>, AppError>;

impl<T: Serialize> Envelope<T> {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>, data: Option<T>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            data,
        }
    }

    pub fn ok(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self::new(StatusCode::OK, message, Some(data))
    }

    pub fn created(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self::new(StatusCode::CREATED, message, Some(data))
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::OK, message, None)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// `Json` extractor whose rejection is an enveloped 400 instead of axum's plain text.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Path` extractor with the same enveloped 400 on rejection.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct AppPath<T>(pub T);
