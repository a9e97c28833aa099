use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use mongodb::bson::oid::ObjectId;
use tracing::instrument;

use super::{repo, Transaction};
use crate::{
    envelope::{ApiResult, AppPath, Envelope},
    error::AppError,
    resource,
    state::AppState,
};

fn listing(found: Vec<Transaction>) -> ApiResult<Vec<Transaction>> {
    let message = if found.is_empty() {
        "No transactions found"
    } else {
        "Transactions found"
    };
    Ok(Envelope::ok(message, found))
}

/// `/:key` is either a transaction id or a `<month>-<year>` period.
#[instrument(skip(state))]
pub async fn get_by_key(
    State(state): State<AppState>,
    AppPath(key): AppPath<String>,
) -> Result<Response, AppError> {
    if ObjectId::parse_str(&key).is_err() && key.contains('-') {
        let (month, year) = repo::parse_period(&key)?;
        let found = state.transactions.get_by_month_year(month, year, None).await?;
        return listing(found).map(IntoResponse::into_response);
    }
    resource::get_by_id::<Transaction>(State(state), AppPath(key))
        .await
        .map(IntoResponse::into_response)
}

#[instrument(skip(state))]
pub async fn get_by_user_period(
    State(state): State<AppState>,
    AppPath(period): AppPath<String>,
) -> ApiResult<Vec<Transaction>> {
    let (month, year, user_id) = repo::parse_user_period(&period)?;
    listing(
        state
            .transactions
            .get_by_month_year(month, year, Some(&user_id))
            .await?,
    )
}

#[instrument(skip(state))]
pub async fn get_by_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Vec<Transaction>> {
    listing(state.transactions.get_by_category(&id).await?)
}

#[instrument(skip(state))]
pub async fn get_by_account(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Vec<Transaction>> {
    listing(state.transactions.get_by_account(&id).await?)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::transactions::repo_types::{NewTransaction, TransactionKind, TransactionPatch};

    fn draft(title: &str) -> NewTransaction {
        NewTransaction {
            title: title.into(),
            amount: 120_000,
            date: datetime!(2024-03-15 9:30 UTC),
            kind: TransactionKind::Income,
            category_id: "salary".into(),
            account_id: "bank".into(),
            user_id: "u1".into(),
            image_url: String::new(),
            is_active: None,
        }
    }

    #[tokio::test]
    async fn key_dispatches_between_id_and_period() {
        let state = AppState::fake().await;
        let created = state.transactions.create(draft("Salary")).await.unwrap();

        let by_id = get_by_key(State(state.clone()), AppPath(created.id.to_hex()))
            .await
            .unwrap();
        assert_eq!(by_id.status(), axum::http::StatusCode::OK);

        let by_period = get_by_key(State(state.clone()), AppPath("3-2024".into()))
            .await
            .unwrap();
        let body = axum::body::to_bytes(by_period.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Transactions found");
        assert_eq!(json["data"][0]["type"], "income");
        assert_eq!(json["data"][0]["date"], "2024-03-15T09:30:00Z");

        let bad = get_by_key(State(state), AppPath("13-2024".into()))
            .await
            .unwrap_err();
        assert!(matches!(bad, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_listing_has_its_own_message() {
        let state = AppState::fake().await;
        let env = get_by_account(State(state), AppPath("nowhere".into()))
            .await
            .unwrap();
        assert_eq!(env.message, "No transactions found");
        assert_eq!(env.data.map(|d| d.len()), Some(0));
    }

    #[test]
    fn patch_only_sets_sent_fields() {
        use crate::db::Patch;

        let patch: TransactionPatch = serde_json::from_value(serde_json::json!({
            "id": "65f0c0ffee0000000000abcd",
            "amount": -300,
            "type": "expense",
        }))
        .unwrap();
        let set = patch.into_set();
        assert_eq!(set.get_i64("amount").unwrap(), -300);
        assert_eq!(set.get_str("type").unwrap(), "expense");
        assert!(!set.contains_key("title"));
        assert!(!set.contains_key("date"));
    }
}
