//! In-process store used by tests and local runs without a database.
//!
//! Understands the subset of the query language the repositories emit:
//! field equality, `$or`, `$and`, the comparison operators and `$set`.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::{Collection, DocumentStore, StoreError, UpdateOutcome};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, name: &str) -> Arc<MemoryCollection> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.get(name)
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let coll = self.get(collection);
        let mut state = coll.state.lock().await;
        if !state.unique.iter().any(|f| f == field) {
            state.unique.push(field.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
struct State {
    docs: Vec<Document>,
    unique: Vec<String>,
}

pub struct MemoryCollection {
    name: String,
    state: AsyncMutex<State>,
}

impl MemoryCollection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: AsyncMutex::new(State::default()),
        }
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.docs.iter().find(|d| doc_matches(d, &filter)).cloned())
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<Document>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .docs
            .iter()
            .filter(|d| doc_matches(d, &filter))
            .cloned()
            .collect())
    }

    async fn insert_one(&self, mut doc: Document) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !doc.contains_key("_id") {
            doc.insert("_id", ObjectId::new());
        }
        let id = doc.get("_id").cloned();
        if state.docs.iter().any(|d| d.get("_id") == id.as_ref()) {
            return Err(StoreError::Duplicate { field: "_id".into() });
        }
        check_unique(&state, &doc, None)?;
        state.docs.push(doc);
        debug!(collection = %self.name, "document inserted");
        Ok(())
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let Some(index) = state.docs.iter().position(|d| doc_matches(d, &filter)) else {
            return Ok(UpdateOutcome::default());
        };

        let mut next = state.docs[index].clone();
        for (op, fields) in update {
            match (op.as_str(), fields) {
                ("$set", Bson::Document(fields)) => {
                    for (k, v) in fields {
                        next.insert(k, v);
                    }
                }
                (other, _) => {
                    return Err(StoreError::Backend(format!(
                        "unsupported update operator `{other}`"
                    )))
                }
            }
        }
        check_unique(&state, &next, Some(index))?;

        state.docs[index] = next;
        Ok(UpdateOutcome { matched: 1 })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        match state.docs.iter().position(|d| doc_matches(d, &filter)) {
            Some(index) => {
                state.docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

fn is_soft_deleted(doc: &Document) -> bool {
    matches!(doc.get("isDeleted"), Some(Bson::Boolean(true)))
}

fn check_unique(state: &State, candidate: &Document, skip: Option<usize>) -> Result<(), StoreError> {
    if is_soft_deleted(candidate) {
        return Ok(());
    }
    for field in &state.unique {
        let Some(value) = candidate.get(field) else {
            continue;
        };
        let clash = state
            .docs
            .iter()
            .enumerate()
            .filter(|(i, d)| Some(*i) != skip && !is_soft_deleted(d))
            .any(|(_, d)| d.get(field).is_some_and(|v| values_equal(v, value)));
        if clash {
            return Err(StoreError::Duplicate {
                field: field.clone(),
            });
        }
    }
    Ok(())
}

fn doc_matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, cond)| match (key.as_str(), cond) {
        ("$or", Bson::Array(alts)) => alts.iter().any(|alt| sub_matches(doc, alt)),
        ("$and", Bson::Array(all)) => all.iter().all(|sub| sub_matches(doc, sub)),
        (field, cond) => field_matches(doc.get(field), cond),
    })
}

fn sub_matches(doc: &Document, filter: &Bson) -> bool {
    match filter {
        Bson::Document(filter) => doc_matches(doc, filter),
        _ => false,
    }
}

fn field_matches(value: Option<&Bson>, cond: &Bson) -> bool {
    match cond {
        Bson::Document(ops) if is_operator_doc(ops) => {
            ops.iter().all(|(op, operand)| apply_operator(value, op, operand))
        }
        expected => match value {
            Some(actual) => values_equal(actual, expected),
            None => matches!(expected, Bson::Null),
        },
    }
}

fn is_operator_doc(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn apply_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> bool {
    let ord = value.and_then(|v| compare(v, operand));
    match op {
        "$eq" => value.is_some_and(|v| values_equal(v, operand)),
        "$ne" => !value.is_some_and(|v| values_equal(v, operand)),
        "$gt" => ord == Some(Ordering::Greater),
        "$gte" => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        "$lt" => ord == Some(Ordering::Less),
        "$lte" => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        _ => false,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn as_number(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, DateTime};

    fn store_with(name: &str) -> (MemoryStore, Arc<dyn Collection>) {
        let store = MemoryStore::new();
        let coll = store.collection(name);
        (store, coll)
    }

    #[tokio::test]
    async fn or_filter_matches_either_branch() {
        let (_store, coll) = store_with("users");
        coll.insert_one(doc! { "username": "ann", "email": "ann@x.com" })
            .await
            .unwrap();
        coll.insert_one(doc! { "username": "bob", "email": "bob@x.com" })
            .await
            .unwrap();

        let found = coll
            .find_many(doc! { "$or": [ { "username": "zed" }, { "email": "bob@x.com" } ] })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("username").unwrap(), "bob");
    }

    #[tokio::test]
    async fn range_filter_is_half_open() {
        let (_store, coll) = store_with("transactions");
        for ms in [999, 1_000, 1_500, 2_000] {
            coll.insert_one(doc! { "date": DateTime::from_millis(ms) })
                .await
                .unwrap();
        }
        let found = coll
            .find_many(doc! { "date": {
                "$gte": DateTime::from_millis(1_000),
                "$lt": DateTime::from_millis(2_000)
            } })
            .await
            .unwrap();
        let millis: Vec<i64> = found
            .iter()
            .map(|d| d.get_datetime("date").unwrap().timestamp_millis())
            .collect();
        assert_eq!(millis, vec![1_000, 1_500]);
    }

    #[tokio::test]
    async fn set_only_touches_named_fields() {
        let (_store, coll) = store_with("accounts");
        let id = ObjectId::new();
        coll.insert_one(doc! { "_id": id, "title": "Cash", "userId": "u1" })
            .await
            .unwrap();

        let outcome = coll
            .update_one(doc! { "_id": id }, doc! { "$set": { "title": "Wallet" } })
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1 });

        let doc = coll.find_one(doc! { "_id": id }).await.unwrap().unwrap();
        assert_eq!(doc.get_str("title").unwrap(), "Wallet");
        assert_eq!(doc.get_str("userId").unwrap(), "u1");
    }

    #[tokio::test]
    async fn update_without_match_reports_zero() {
        let (_store, coll) = store_with("accounts");
        let outcome = coll
            .update_one(doc! { "_id": ObjectId::new() }, doc! { "$set": { "title": "x" } })
            .await
            .unwrap();
        assert_eq!(outcome.matched, 0);
    }

    #[tokio::test]
    async fn unique_fields_ignore_soft_deleted_documents() {
        let (store, coll) = store_with("users");
        store.ensure_unique("users", "email").await.unwrap();

        coll.insert_one(doc! { "email": "a@x.com", "isDeleted": true })
            .await
            .unwrap();
        coll.insert_one(doc! { "email": "a@x.com", "isDeleted": false })
            .await
            .unwrap();
        let err = coll
            .insert_one(doc! { "email": "a@x.com", "isDeleted": false })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field } if field == "email"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_store, coll) = store_with("categories");
        let id = ObjectId::new();
        coll.insert_one(doc! { "_id": id }).await.unwrap();
        assert_eq!(coll.delete_one(doc! { "_id": id }).await.unwrap(), 1);
        assert_eq!(coll.delete_one(doc! { "_id": id }).await.unwrap(), 0);
    }

    #[test]
    fn numeric_equality_crosses_integer_widths() {
        assert!(values_equal(&Bson::Int32(5), &Bson::Int64(5)));
        assert!(!values_equal(&Bson::Int32(5), &Bson::String("5".into())));
    }
}
