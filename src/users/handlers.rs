use axum::extract::State;
use tracing::{info, instrument};

use super::{User, UserPatch};
use crate::{
    auth::{
        dto::RegisterRequest,
        extractors::AuthUser,
        password::hash_password_blocking,
        services::{self, is_valid_email, normalize_email},
    },
    envelope::{ApiResult, AppJson, AppPath, Envelope},
    error::AppError,
    state::AppState,
};

#[instrument(skip(state, payload, caller))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(payload): AppJson<RegisterRequest>,
) -> ApiResult<User> {
    let user = services::register(&state.users, payload).await?;
    info!(caller = %caller.sub, user_id = %user.id, "user created");
    Ok(Envelope::created("User created successfully", user))
}

#[instrument(skip(state))]
pub async fn get_all(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let users = state.users.get_all_active().await?;
    Ok(Envelope::ok("Users fetched successfully", users))
}

#[instrument(skip(state, caller))]
pub async fn me(State(state): State<AppState>, AuthUser(caller): AuthUser) -> ApiResult<User> {
    let user = state.users.get_by_id(&caller.sub).await?;
    Ok(Envelope::ok("User fetched successfully", user))
}

#[instrument(skip(state))]
pub async fn get_by_id(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<User> {
    let user = state.users.get_by_id(&id).await?;
    Ok(Envelope::ok("User fetched successfully", user))
}

#[instrument(skip(state))]
pub async fn get_by_email(
    State(state): State<AppState>,
    AppPath(email): AppPath<String>,
) -> ApiResult<User> {
    let user = state.users.get_by_email(&normalize_email(&email)).await?;
    Ok(Envelope::ok("User fetched successfully", user))
}

#[instrument(skip(state))]
pub async fn get_by_username(
    State(state): State<AppState>,
    AppPath(username): AppPath<String>,
) -> ApiResult<User> {
    let user = state.users.get_by_username(&username).await?;
    Ok(Envelope::ok("User fetched successfully", user))
}

#[instrument(skip(state))]
pub async fn get_deleted(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let users = state.users.get_all_deleted().await?;
    Ok(Envelope::ok("Users fetched successfully", users))
}

#[instrument(skip(state, caller))]
pub async fn restore(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<String>,
) -> ApiResult<()> {
    state.users.restore(&id).await?;
    info!(caller = %caller.sub, %id, "user restored");
    Ok(Envelope::message("User restored successfully"))
}

/// Applies the same username and email rules as registration before writing.
#[instrument(skip(state, caller, patch))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(mut patch): AppJson<UserPatch>,
) -> ApiResult<User> {
    if let Some(username) = patch.username.take() {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::validation("Username must not be empty"));
        }
        patch.username = Some(username.to_string());
    }
    if let Some(email) = patch.email.take() {
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(AppError::validation("Invalid email"));
        }
        patch.email = Some(email);
    }
    if let Some(password) = patch.password.take().filter(|p| !p.is_empty()) {
        patch.password_hash = Some(hash_password_blocking(password).await?);
    }

    let user = state.users.update(patch).await?;
    info!(caller = %caller.sub, user_id = %user.id, "user updated");
    Ok(Envelope::ok("User updated successfully", user))
}

/// Soft delete: the record stays and can be restored through `/du/:id`.
#[instrument(skip(state, caller))]
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<String>,
) -> ApiResult<()> {
    state.users.soft_delete(&id).await?;
    info!(caller = %caller.sub, %id, "user deleted");
    Ok(Envelope::message("User deleted successfully"))
}
