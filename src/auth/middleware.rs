use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{
    error::{AppError, AuthFailure},
    state::AppState,
};

/// Rejects requests without a valid session cookie. On success the decoded
/// claims are stored in the request extensions for [`super::extractors::AuthUser`].
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = state.cookie.extract(req.headers()) else {
        warn!(uri = %req.uri(), "missing session cookie");
        return Err(AuthFailure::MissingToken.into());
    };

    let claims = state.keys.validate(&token).map_err(|e| {
        warn!(uri = %req.uri(), error = %e, "session token rejected");
        AuthFailure::InvalidToken(e)
    })?;

    debug!(user_id = %claims.sub, "session accepted");
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
