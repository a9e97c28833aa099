//! Shared repository machinery: audit fields, id/time conversions and the
//! generic [`Repo`] every resource collection is accessed through.

use std::{marker::PhantomData, sync::Arc};

use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    store::{Collection, DocumentStore, StoreError},
};

/// A document type stored in its own collection.
pub trait Entity: Sized + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Human name used in messages, e.g. "Account".
    const LABEL: &'static str;

    /// Fields accepted on create.
    type Draft: Send + 'static;
    /// Sparse fields accepted on update.
    type Patch: Patch;

    fn build(id: ObjectId, draft: Self::Draft, now: OffsetDateTime) -> Self;
    fn id(&self) -> ObjectId;
    fn to_document(&self) -> Document;
    fn from_document(doc: &Document) -> Result<Self, StoreError>;
}

/// A partial update. Only fields the caller actually sent end up in `$set`.
pub trait Patch: Send + 'static {
    fn id(&self) -> &str;
    fn into_set(self) -> Document;
}

/// Audit fields shared by every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    pub is_deleted: bool,
    pub is_active: bool,
}

impl Meta {
    pub fn new(now: OffsetDateTime, is_active: bool) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
            is_deleted: false,
            is_active,
        }
    }

    pub fn write(&self, doc: &mut Document) {
        doc.insert("createdAt", to_bson_time(self.created_at));
        doc.insert("updatedAt", to_bson_time(self.updated_at));
        doc.insert("deletedAt", self.deleted_at.map_or(Bson::Null, |t| to_bson_time(t).into()));
        doc.insert("isDeleted", self.is_deleted);
        doc.insert("isActive", self.is_active);
    }

    pub fn read(doc: &Document) -> Self {
        Self {
            created_at: read_time(doc, "createdAt").unwrap_or(OffsetDateTime::UNIX_EPOCH),
            updated_at: read_time(doc, "updatedAt").unwrap_or(OffsetDateTime::UNIX_EPOCH),
            deleted_at: read_time(doc, "deletedAt"),
            is_deleted: read_bool(doc, "isDeleted"),
            is_active: read_bool(doc, "isActive"),
        }
    }
}

/// Current time at storage precision (milliseconds).
pub fn now() -> OffsetDateTime {
    truncate_millis(OffsetDateTime::now_utc())
}

pub fn truncate_millis(t: OffsetDateTime) -> OffsetDateTime {
    from_bson_time(to_bson_time(t))
}

pub fn to_bson_time(t: OffsetDateTime) -> BsonDateTime {
    BsonDateTime::from_millis((t.unix_timestamp_nanos() / 1_000_000) as i64)
}

pub fn from_bson_time(t: BsonDateTime) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(t.timestamp_millis()) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

pub fn parse_id(raw: &str, label: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| AppError::validation(format!("Invalid {} id", label.to_lowercase())))
}

pub fn serialize_hex<S: Serializer>(id: &ObjectId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&id.to_hex())
}

pub(crate) fn read_id(doc: &Document) -> Result<ObjectId, StoreError> {
    doc.get_object_id("_id")
        .map_err(|e| StoreError::Decode(format!("_id: {e}")))
}

pub(crate) fn read_str(doc: &Document, key: &str) -> String {
    doc.get_str(key).map(str::to_string).unwrap_or_default()
}

pub(crate) fn read_bool(doc: &Document, key: &str) -> bool {
    doc.get_bool(key).unwrap_or(false)
}

pub(crate) fn read_time(doc: &Document, key: &str) -> Option<OffsetDateTime> {
    doc.get_datetime(key).ok().map(|t| from_bson_time(*t))
}

/// Puts `value` into `set` only when the caller supplied it.
pub(crate) fn set_if<T: Into<Bson>>(set: &mut Document, key: &str, value: Option<T>) {
    if let Some(v) = value {
        set.insert(key, v);
    }
}

pub struct Repo<E> {
    coll: Arc<dyn Collection>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repo<E> {
    fn clone(&self) -> Self {
        Self {
            coll: self.coll.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repo<E> {
    pub fn new(store: &dyn DocumentStore) -> Self {
        Self {
            coll: store.collection(E::COLLECTION),
            _entity: PhantomData,
        }
    }

    /// Assigns id and timestamps, then inserts.
    pub async fn create(&self, draft: E::Draft) -> AppResult<E> {
        let entity = E::build(ObjectId::new(), draft, now());
        self.coll.insert_one(entity.to_document()).await?;
        debug!(collection = self.coll.name(), id = %entity.id(), "document created");
        Ok(entity)
    }

    pub async fn get_all(&self) -> AppResult<Vec<E>> {
        self.find_many(Document::new()).await
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<E> {
        let oid = parse_id(id, E::LABEL)?;
        self.find_one(doc! { "_id": oid })
            .await?
            .ok_or(AppError::NotFound(E::LABEL))
    }

    pub async fn get_by_owner(&self, user_id: &str) -> AppResult<Vec<E>> {
        self.find_by("userId", user_id).await
    }

    /// Exact match on a string field.
    pub async fn find_by(&self, field: &str, value: &str) -> AppResult<Vec<E>> {
        let mut filter = Document::new();
        filter.insert(field, value);
        self.find_many(filter).await
    }

    pub async fn find_one(&self, filter: Document) -> AppResult<Option<E>> {
        match self.coll.find_one(filter).await? {
            Some(doc) => Ok(Some(E::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_many(&self, filter: Document) -> AppResult<Vec<E>> {
        let docs = self.coll.find_many(filter).await?;
        let entities = docs
            .iter()
            .map(E::from_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    /// Applies the fields present in `patch` and returns the stored result.
    pub async fn update(&self, patch: E::Patch) -> AppResult<E> {
        let id = patch.id().to_string();
        self.set_fields(&id, patch.into_set()).await?;
        self.get_by_id(&id).await
    }

    /// `$set` the given fields plus `updatedAt` on the document with `id`.
    pub async fn set_fields(&self, id: &str, mut set: Document) -> AppResult<()> {
        let oid = parse_id(id, E::LABEL)?;
        set.insert("updatedAt", to_bson_time(now()));
        let outcome = self
            .coll
            .update_one(doc! { "_id": oid }, doc! { "$set": set })
            .await?;
        if outcome.matched == 0 {
            return Err(AppError::NotFound(E::LABEL));
        }
        Ok(())
    }

    /// Hard delete. Returns whether a document was removed; a missing
    /// document is not an error.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let oid = parse_id(id, E::LABEL)?;
        let removed = self.coll.delete_one(doc! { "_id": oid }).await?;
        debug!(collection = self.coll.name(), %oid, removed, "delete");
        Ok(removed > 0)
    }
}
