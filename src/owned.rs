//! Records that are just a titled icon owned by a user. Accounts and
//! categories share this shape and differ only in their collection.

use std::marker::PhantomData;

use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    db::{read_id, read_str, serialize_hex, set_if, Entity, Meta, Patch},
    store::StoreError,
};

/// Names one kind of owned record.
pub trait OwnedKind: Send + Sync + 'static {
    const COLLECTION: &'static str;
    const LABEL: &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct Owned<K> {
    #[serde(serialize_with = "serialize_hex")]
    pub id: ObjectId,
    pub title: String,
    #[serde(rename = "imageUrl")]
    pub icon: String,
    pub user_id: String,
    #[serde(flatten)]
    pub meta: Meta,
    #[serde(skip)]
    pub kind: PhantomData<K>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct NewOwned<K> {
    pub title: String,
    #[serde(default, rename = "imageUrl")]
    pub icon: String,
    #[serde(default)]
    pub user_id: String,
    pub is_active: Option<bool>,
    #[serde(skip)]
    pub kind: PhantomData<K>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct OwnedPatch<K> {
    pub id: String,
    pub title: Option<String>,
    #[serde(rename = "imageUrl")]
    pub icon: Option<String>,
    pub user_id: Option<String>,
    pub is_active: Option<bool>,
    #[serde(skip)]
    pub kind: PhantomData<K>,
}

impl<K: OwnedKind> Entity for Owned<K> {
    const COLLECTION: &'static str = K::COLLECTION;
    const LABEL: &'static str = K::LABEL;

    type Draft = NewOwned<K>;
    type Patch = OwnedPatch<K>;

    fn build(id: ObjectId, draft: NewOwned<K>, now: OffsetDateTime) -> Self {
        Self {
            id,
            title: draft.title,
            icon: draft.icon,
            user_id: draft.user_id,
            meta: Meta::new(now, draft.is_active.unwrap_or(true)),
            kind: PhantomData,
        }
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn to_document(&self) -> Document {
        let mut doc = doc! {
            "_id": self.id,
            "title": self.title.clone(),
            "imageUrl": self.icon.clone(),
            "userId": self.user_id.clone(),
        };
        self.meta.write(&mut doc);
        doc
    }

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        Ok(Self {
            id: read_id(doc)?,
            title: read_str(doc, "title"),
            icon: read_str(doc, "imageUrl"),
            user_id: read_str(doc, "userId"),
            meta: Meta::read(doc),
            kind: PhantomData,
        })
    }
}

impl<K: OwnedKind> Patch for OwnedPatch<K> {
    fn id(&self) -> &str {
        &self.id
    }

    fn into_set(self) -> Document {
        let mut set = Document::new();
        set_if(&mut set, "title", self.title);
        set_if(&mut set, "imageUrl", self.icon);
        set_if(&mut set, "userId", self.user_id);
        set_if(&mut set, "isActive", self.is_active);
        set
    }
}
