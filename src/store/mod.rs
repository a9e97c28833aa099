//! Document-store boundary.
//!
//! Repositories only ever talk to a [`Collection`]; the concrete backend is
//! chosen once at startup and injected through [`DocumentStore`].

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::Document;
use thiserror::Error;

pub mod memory;
pub mod mongo;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint on `field` rejected the write.
    #[error("duplicate value for unique field `{field}`")]
    Duplicate { field: String },
    #[error("stored document could not be decoded: {0}")]
    Decode(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Result of an `update_one` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
}

#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError>;
    async fn find_many(&self, filter: Document) -> Result<Vec<Document>, StoreError>;
    async fn insert_one(&self, doc: Document) -> Result<(), StoreError>;
    /// `update` is an update document, e.g. `{ "$set": { .. } }`.
    async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError>;
    /// Returns the number of removed documents (0 or 1).
    async fn delete_one(&self, filter: Document) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Enforce uniqueness of `field` across documents that are not soft-deleted.
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError>;
}
