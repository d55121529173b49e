//! Storage collaborator interface.
//!
//! A [`Collection`] executes compiled filters against a named set of JSON
//! documents. [`MemoryCollection`] is the in-process implementation used by
//! the CLI and the test suites.

mod matcher;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::collation::Collation;
use crate::filter::SortKey;

pub use matcher::{lookup_path, matches};
pub use memory::MemoryCollection;

/// A stored document.
pub type Document = Map<String, Value>;

/// Errors raised by storage backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The filter document is not something the backend understands.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// An insert collided with an existing unique key.
    #[error("duplicate key in '{collection}': {key} = {value}")]
    DuplicateKey {
        /// Collection name.
        collection: String,
        /// Unique field name.
        key: String,
        /// The colliding value.
        value: String,
    },

    /// The backend could not be reached or failed mid-operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Options for a windowed, ordered read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindOptions {
    /// Sort keys, primary first.
    pub sort: Vec<SortKey>,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return; `None` for no limit.
    pub limit: Option<u64>,
    /// String ordering.
    pub collation: Collation,
}

impl FindOptions {
    /// Options that return every match in storage order.
    pub fn all() -> Self {
        Self::default()
    }
}

/// Outcome of a bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    /// Documents matched by the filter.
    pub matched: u64,
    /// Documents whose content actually changed.
    pub modified: u64,
}

/// A named collection of documents.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Counts documents matching `filter`.
    async fn count(&self, filter: &Value) -> StoreResult<u64>;

    /// Returns documents matching `filter`, ordered and windowed by `options`.
    async fn find(&self, filter: &Value, options: &FindOptions) -> StoreResult<Vec<Document>>;

    /// Returns the first document matching `filter`.
    async fn find_one(&self, filter: &Value) -> StoreResult<Option<Document>> {
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::default()
        };
        Ok(self.find(filter, &options).await?.into_iter().next())
    }

    /// Inserts a document.
    async fn insert_one(&self, document: Document) -> StoreResult<()>;

    /// Sets the fields of `set` on every document matching `filter`.
    ///
    /// Keys may be dot-separated paths; missing intermediate objects are
    /// created.
    async fn update_many(&self, filter: &Value, set: &Document) -> StoreResult<UpdateResult>;

    /// Removes every document matching `filter` and returns how many were
    /// removed.
    async fn delete_many(&self, filter: &Value) -> StoreResult<u64>;
}
