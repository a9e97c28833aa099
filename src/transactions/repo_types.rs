use std::str::FromStr;

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    db::{
        read_id, read_str, read_time, serialize_hex, set_if, to_bson_time, truncate_millis, Entity,
        Meta, Patch,
    },
    store::StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(StoreError::Decode(format!("unknown transaction type `{other}`"))),
        }
    }
}

/// A single income or expense entry. `amount` is in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(serialize_with = "serialize_hex")]
    pub id: ObjectId,
    pub title: String,
    pub amount: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category_id: String,
    pub account_id: String,
    pub user_id: String,
    pub image_url: String,
    #[serde(flatten)]
    pub meta: Meta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub title: String,
    pub amount: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub image_url: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    pub id: String,
    pub title: Option<String>,
    pub amount: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub category_id: Option<String>,
    pub account_id: Option<String>,
    pub user_id: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

impl Entity for Transaction {
    const COLLECTION: &'static str = "transactions";
    const LABEL: &'static str = "Transaction";

    type Draft = NewTransaction;
    type Patch = TransactionPatch;

    fn build(id: ObjectId, draft: NewTransaction, now: OffsetDateTime) -> Self {
        Self {
            id,
            title: draft.title,
            amount: draft.amount,
            date: truncate_millis(draft.date),
            kind: draft.kind,
            category_id: draft.category_id,
            account_id: draft.account_id,
            user_id: draft.user_id,
            image_url: draft.image_url,
            meta: Meta::new(now, draft.is_active.unwrap_or(true)),
        }
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn to_document(&self) -> Document {
        let mut doc = doc! {
            "_id": self.id,
            "title": self.title.clone(),
            "amount": self.amount,
            "date": to_bson_time(self.date),
            "type": self.kind.as_str(),
            "categoryId": self.category_id.clone(),
            "accountId": self.account_id.clone(),
            "userId": self.user_id.clone(),
            "imageUrl": self.image_url.clone(),
        };
        self.meta.write(&mut doc);
        doc
    }

    fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let date = read_time(doc, "date")
            .ok_or_else(|| StoreError::Decode("transaction without a date".into()))?;
        Ok(Self {
            id: read_id(doc)?,
            title: read_str(doc, "title"),
            amount: read_amount(doc),
            date,
            kind: read_str(doc, "type").parse()?,
            category_id: read_str(doc, "categoryId"),
            account_id: read_str(doc, "accountId"),
            user_id: read_str(doc, "userId"),
            image_url: read_str(doc, "imageUrl"),
            meta: Meta::read(doc),
        })
    }
}

// Older writers stored amounts as 32-bit ints or doubles.
fn read_amount(doc: &Document) -> i64 {
    match doc.get("amount") {
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

impl Patch for TransactionPatch {
    fn id(&self) -> &str {
        &self.id
    }

    fn into_set(self) -> Document {
        let mut set = Document::new();
        set_if(&mut set, "title", self.title);
        set_if(&mut set, "amount", self.amount);
        set_if(&mut set, "date", self.date.map(|d| to_bson_time(truncate_millis(d))));
        set_if(&mut set, "type", self.kind.map(TransactionKind::as_str));
        set_if(&mut set, "categoryId", self.category_id);
        set_if(&mut set, "accountId", self.account_id);
        set_if(&mut set, "userId", self.user_id);
        set_if(&mut set, "imageUrl", self.image_url);
        set_if(&mut set, "isActive", self.is_active);
        set
    }
}
