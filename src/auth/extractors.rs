use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::claims::Claims;
use crate::error::{AppError, AuthFailure};

/// Identity of the caller, as established by [`super::middleware::require_session`].
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Auth(AuthFailure::MissingToken))
    }
}
