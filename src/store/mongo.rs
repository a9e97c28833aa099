use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Database, IndexModel,
};
use tracing::{debug, info};

use super::{Collection, DocumentStore, StoreError, UpdateOutcome};

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed store. One client per process, shared by every collection.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(url: &str, database: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(url)
            .await
            .context("parse MONGO_URL")?;
        options.app_name = Some("budget-server".into());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).context("build mongo client")?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .context("ping mongo")?;

        info!(database, "connected to mongo");
        Ok(Self { db })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MongoCollection {
            inner: self.db.collection::<Document>(name),
        })
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let mut keys = Document::new();
        keys.insert(field, 1);
        let options = IndexOptions::builder()
            .name(format!("{field}_unique"))
            .unique(true)
            .partial_filter_expression(doc! { "isDeleted": false })
            .build();
        let model = IndexModel::builder().keys(keys).options(options).build();

        self.db
            .collection::<Document>(collection)
            .create_index(model, None)
            .await
            .map_err(classify)?;
        debug!(collection, field, "unique index ensured");
        Ok(())
    }
}

pub struct MongoCollection {
    inner: mongodb::Collection<Document>,
}

#[async_trait]
impl Collection for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError> {
        self.inner.find_one(filter, None).await.map_err(classify)
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<Document>, StoreError> {
        let cursor = self.inner.find(filter, None).await.map_err(classify)?;
        cursor.try_collect().await.map_err(classify)
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        self.inner
            .insert_one(doc, None)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        let res = self
            .inner
            .update_one(filter, update, None)
            .await
            .map_err(classify)?;
        Ok(UpdateOutcome {
            matched: res.matched_count,
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, StoreError> {
        let res = self.inner.delete_one(filter, None).await.map_err(classify)?;
        Ok(res.deleted_count)
    }
}

fn classify(err: MongoError) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write)) = *err.kind {
        if write.code == DUPLICATE_KEY {
            return StoreError::Duplicate {
                field: duplicate_field(&write.message),
            };
        }
    }
    StoreError::Backend(err.to_string())
}

/// Pulls the field name out of an E11000 message such as
/// `... dup key: { email: "a@x.com" }`.
fn duplicate_field(message: &str) -> String {
    message
        .split("dup key: { ")
        .nth(1)
        .and_then(|rest| rest.split(':').next())
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .unwrap_or_else(|| "unknown".into())
}
