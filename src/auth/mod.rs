use crate::state::AppState;
use axum::Router;

pub(crate) mod claims;
pub mod cookie;
pub(crate) mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod services;

/// Public routes: `/register`, `/login`, `/logout`.
pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
