use axum::Router;

use crate::{
    db::Repo,
    owned::{Owned, OwnedKind},
    resource::{crud_router, Resource},
    state::AppState,
};

/// Spending or income category owned by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryKind;

impl OwnedKind for CategoryKind {
    const COLLECTION: &'static str = "categories";
    const LABEL: &'static str = "Category";
}

pub type Category = Owned<CategoryKind>;

pub type CategoryRepo = Repo<Category>;

impl Resource for Category {
    const PLURAL: &'static str = "Categories";

    fn repo(state: &AppState) -> &Repo<Self> {
        &state.categories
    }
}

pub fn router() -> Router<AppState> {
    crud_router::<Category>()
}
