use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    db::{read_bool, read_id, read_str, serialize_hex, set_if, Entity, Meta, Patch},
    store::StoreError,
};

/// User record. The password is only ever held as an Argon2 digest and is
/// never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(serialize_with = "serialize_hex")]
    pub id: ObjectId,
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub image_url: String,
    pub is_verified: bool,
    #[serde(flatten)]
    pub meta: Meta,
}

/// Validated registration data; the password is already hashed.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub id: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Plaintext from the request body; hashed into `password_hash` before
    /// the patch reaches the repository.
    pub password: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const LABEL: &'static str = "User";

    type Draft = NewUser;
    type Patch = UserPatch;

    fn build(id: ObjectId, draft: NewUser, now: OffsetDateTime) -> Self {
        Self {
            id,
            username: draft.username,
            name: draft.name,
            email: draft.email,
            password_hash: draft.password_hash,
            image_url: draft.image_url,
            is_verified: false,
            meta: Meta::new(now, true),
        }
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn to_document(&self) -> Document {
        let mut doc = doc! {
            "_id": self.id,
            "username": self.username.clone(),
            "name": self.name.clone(),
            "email": self.email.clone(),
            "password": self.password_hash.clone(),
            "imageUrl": self.image_url.clone(),
            "isVerified": self.is_verified,
        };
        self.meta.write(&mut doc);
        doc
    }

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        Ok(Self {
            id: read_id(doc)?,
            username: read_str(doc, "username"),
            name: read_str(doc, "name"),
            email: read_str(doc, "email"),
            password_hash: read_str(doc, "password"),
            image_url: read_str(doc, "imageUrl"),
            is_verified: read_bool(doc, "isVerified"),
            meta: Meta::read(doc),
        })
    }
}

impl Patch for UserPatch {
    fn id(&self) -> &str {
        &self.id
    }

    // A plaintext `password` that was never hashed is dropped, not stored.
    fn into_set(self) -> Document {
        let mut set = Document::new();
        set_if(&mut set, "username", self.username);
        set_if(&mut set, "name", self.name);
        set_if(&mut set, "email", self.email);
        set_if(&mut set, "password", self.password_hash);
        set_if(&mut set, "imageUrl", self.image_url);
        set_if(&mut set, "isActive", self.is_active);
        set
    }
}
