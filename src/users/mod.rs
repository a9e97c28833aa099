mod handlers;
pub mod repo;
mod repo_types;

use axum::{
    routing::{get, post},
    Router,
};

pub use repo::UserRepo;
pub use repo_types::{NewUser, User, UserPatch};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::create)
                .get(handlers::get_all)
                .put(handlers::update),
        )
        .route("/me", get(handlers::me))
        .route("/du", get(handlers::get_deleted))
        .route("/du/:id", post(handlers::restore))
        .route("/email/:email", get(handlers::get_by_email))
        .route("/username/:username", get(handlers::get_by_username))
        .route("/:id", get(handlers::get_by_id).delete(handlers::delete))
}
