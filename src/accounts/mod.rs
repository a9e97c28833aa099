use axum::Router;

use crate::{
    db::Repo,
    owned::{Owned, OwnedKind},
    resource::{crud_router, Resource},
    state::AppState,
};

/// Account record (cash, bank, card ...) owned by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountKind;

impl OwnedKind for AccountKind {
    const COLLECTION: &'static str = "accounts";
    const LABEL: &'static str = "Account";
}

pub type Account = Owned<AccountKind>;

pub type AccountRepo = Repo<Account>;

impl Resource for Account {
    const PLURAL: &'static str = "Accounts";

    fn repo(state: &AppState) -> &Repo<Self> {
        &state.accounts
    }
}

pub fn router() -> Router<AppState> {
    crud_router::<Account>()
}
