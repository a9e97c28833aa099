//! CRUD handlers shared by every resource collection.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    db::{Entity, Repo},
    envelope::{ApiResult, AppJson, AppPath, Envelope},
    state::AppState,
};

/// An entity reachable over HTTP through its repository in [`AppState`].
pub trait Resource: Entity + Serialize {
    /// Plural label for listing messages, e.g. "Accounts".
    const PLURAL: &'static str;

    fn repo(state: &AppState) -> &Repo<Self>;
}

/// `/`, `/:id` and `/user/:id` routes for a resource.
pub fn crud_router<R>() -> Router<AppState>
where
    R: Resource,
    R::Draft: DeserializeOwned,
    R::Patch: DeserializeOwned,
{
    Router::new()
        .route("/", post(create::<R>).get(get_all::<R>).put(update::<R>))
        .route("/:id", get(get_by_id::<R>).delete(delete::<R>))
        .route("/user/:id", get(get_by_owner::<R>))
}

#[instrument(skip_all, fields(resource = R::COLLECTION))]
pub async fn create<R>(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(draft): AppJson<R::Draft>,
) -> ApiResult<R>
where
    R: Resource,
    R::Draft: DeserializeOwned,
{
    let created = R::repo(&state).create(draft).await?;
    info!(caller = %caller.sub, id = %created.id(), "created");
    Ok(Envelope::created(format!("{} created", R::LABEL), created))
}

#[instrument(skip_all, fields(resource = R::COLLECTION))]
pub async fn get_all<R: Resource>(State(state): State<AppState>) -> ApiResult<Vec<R>> {
    let all = R::repo(&state).get_all().await?;
    Ok(Envelope::ok(format!("{} fetched successfully", R::PLURAL), all))
}

#[instrument(skip(state), fields(resource = R::COLLECTION))]
pub async fn get_by_id<R: Resource>(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<R> {
    let found = R::repo(&state).get_by_id(&id).await?;
    Ok(Envelope::ok(format!("{} found", R::LABEL), found))
}

#[instrument(skip(state), fields(resource = R::COLLECTION))]
pub async fn get_by_owner<R: Resource>(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
) -> ApiResult<Vec<R>> {
    let owned = R::repo(&state).get_by_owner(&user_id).await?;
    Ok(Envelope::ok(format!("{} found", R::PLURAL), owned))
}

#[instrument(skip_all, fields(resource = R::COLLECTION))]
pub async fn update<R>(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(patch): AppJson<R::Patch>,
) -> ApiResult<R>
where
    R: Resource,
    R::Patch: DeserializeOwned,
{
    let updated = R::repo(&state).update(patch).await?;
    info!(caller = %caller.sub, id = %updated.id(), "updated");
    Ok(Envelope::ok(format!("{} updated successfully", R::LABEL), updated))
}

#[instrument(skip(state, caller), fields(resource = R::COLLECTION))]
pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<String>,
) -> ApiResult<()> {
    let removed = R::repo(&state).delete(&id).await?;
    info!(caller = %caller.sub, %id, removed, "deleted");
    Ok(Envelope::message(format!("{} deleted successfully", R::LABEL)))
}
