mod handlers;
pub mod repo;
mod repo_types;

use axum::{
    routing::{get, post},
    Router,
};

pub use repo::TransactionRepo;
use repo_types::Transaction;

use crate::{
    db::Repo,
    resource::{self, Resource},
    state::AppState,
};

impl Resource for Transaction {
    const PLURAL: &'static str = "Transactions";

    fn repo(state: &AppState) -> &Repo<Self> {
        &state.transactions
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(resource::create::<Transaction>)
                .get(resource::get_all::<Transaction>)
                .put(resource::update::<Transaction>),
        )
        .route(
            "/:key",
            get(handlers::get_by_key).delete(resource::delete::<Transaction>),
        )
        .route("/user/:id", get(resource::get_by_owner::<Transaction>))
        .route("/u/:period", get(handlers::get_by_user_period))
        .route("/category/:id", get(handlers::get_by_category))
        .route("/account/:id", get(handlers::get_by_account))
}
