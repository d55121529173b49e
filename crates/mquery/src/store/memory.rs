//! In-memory collection.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::instrument;

use super::matcher::{lookup_path, matches};
use super::{Collection, Document, FindOptions, StoreError, StoreResult, UpdateResult};
use crate::filter::SortDirection;

/// A collection held in memory behind an async read/write lock.
///
/// Reads are a linear scan. An optional unique key is enforced on insert.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    unique_key: Option<String>,
    documents: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_key: None,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Creates a collection pre-populated with documents.
    pub fn with_documents(name: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            unique_key: None,
            documents: RwLock::new(documents),
        }
    }

    /// Enforces uniqueness of `key` on insert.
    pub fn unique_on(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }

    /// Wraps the collection in an `Arc`.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns a copy of every stored document in insertion order.
    pub async fn snapshot(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns true if the collection holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, filter), fields(collection = %self.name))]
    async fn count(&self, filter: &Value) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        let mut count = 0;
        for document in documents.iter() {
            if matches(document, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    #[instrument(skip(self, filter, options), fields(collection = %self.name, skip = options.skip, limit = ?options.limit))]
    async fn find(&self, filter: &Value, options: &FindOptions) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;

        let mut found = Vec::new();
        for document in documents.iter() {
            if matches(document, filter)? {
                found.push(document);
            }
        }

        if !options.sort.is_empty() {
            // Stable sort keeps insertion order among equal keys.
            found.sort_by(|a, b| {
                for key in &options.sort {
                    let left = lookup_path(a, &key.field).unwrap_or(&Value::Null);
                    let right = lookup_path(b, &key.field).unwrap_or(&Value::Null);
                    let ord = options.collation.compare_values(left, right);
                    let ord = match key.direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(found.into_iter().skip(skip).take(limit).cloned().collect())
    }

    #[instrument(skip(self, document), fields(collection = %self.name))]
    async fn insert_one(&self, document: Document) -> StoreResult<()> {
        let mut documents = self.documents.write().await;

        if let Some(key) = &self.unique_key {
            if let Some(value) = document.get(key) {
                if documents.iter().any(|existing| existing.get(key) == Some(value)) {
                    return Err(StoreError::DuplicateKey {
                        collection: self.name.clone(),
                        key: key.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }

        documents.push(document);
        Ok(())
    }

    #[instrument(skip(self, filter, set), fields(collection = %self.name))]
    async fn update_many(&self, filter: &Value, set: &Document) -> StoreResult<UpdateResult> {
        let mut documents = self.documents.write().await;

        // Evaluate every match before writing so a bad filter leaves no partial update.
        let mut targets = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if matches(document, filter)? {
                targets.push(index);
            }
        }

        let mut result = UpdateResult {
            matched: targets.len() as u64,
            modified: 0,
        };
        for index in targets {
            let document = &mut documents[index];
            let mut changed = false;
            for (field, value) in set {
                changed |= assign_path(document, field, value)?;
            }
            if changed {
                result.modified += 1;
            }
        }
        Ok(result)
    }

    #[instrument(skip(self, filter), fields(collection = %self.name))]
    async fn delete_many(&self, filter: &Value) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;

        let mut keep = Vec::with_capacity(documents.len());
        for document in documents.iter() {
            keep.push(!matches(document, filter)?);
        }

        let before = documents.len();
        let mut flags = keep.into_iter();
        documents.retain(|_| flags.next().unwrap_or(true));
        Ok((before - documents.len()) as u64)
    }
}

/// Writes `value` at a dot-separated `path`, creating intermediate objects.
/// Returns whether the document changed.
fn assign_path(document: &mut Document, path: &str, value: &Value) -> StoreResult<bool> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut target = document;
    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        let slot = target
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        if slot.is_null() {
            *slot = Value::Object(Document::new());
        }
        target = slot.as_object_mut().ok_or_else(|| {
            StoreError::InvalidFilter(format!("cannot set '{path}': '{segment}' is not an object"))
        })?;
    }

    if target.get(leaf) == Some(value) {
        return Ok(false);
    }
    target.insert(leaf.to_string(), value.clone());
    Ok(true)
}
