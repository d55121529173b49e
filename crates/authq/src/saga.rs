//! Multi-collection writes with compensation.
//!
//! A [`Saga`] runs its steps in order. When a step fails, every step that
//! already succeeded is compensated in reverse order and the original error
//! is returned.

use std::sync::Arc;

use async_trait::async_trait;
use mquery::store::{Collection, Document};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::services::{Result, ServiceError};

/// One forward action and its undo.
#[async_trait]
pub trait SagaStep: Send {
    /// Short label used in logs.
    fn label(&self) -> &str;

    /// Performs the step.
    async fn execute(&mut self) -> Result<()>;

    /// Undoes a step whose `execute` succeeded.
    async fn compensate(&mut self) -> Result<()>;
}

/// An ordered list of steps.
pub struct Saga<'a> {
    name: &'a str,
    steps: Vec<Box<dyn SagaStep + 'a>>,
}

impl<'a> Saga<'a> {
    /// Creates an empty saga.
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Appends a step.
    pub fn step(mut self, step: impl SagaStep + 'a) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Runs every step, compensating completed ones on the first failure.
    ///
    /// Compensation failures are logged; the error of the failing forward
    /// step is what the caller sees.
    pub async fn run(mut self) -> Result<()> {
        let mut completed = 0;
        let mut failure: Option<ServiceError> = None;

        for step in self.steps.iter_mut() {
            match step.execute().await {
                Ok(()) => {
                    debug!(saga = self.name, step = step.label(), "step completed");
                    completed += 1;
                }
                Err(e) => {
                    warn!(saga = self.name, step = step.label(), error = %e, "step failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        let Some(failure) = failure else {
            return Ok(());
        };

        for step in self.steps[..completed].iter_mut().rev() {
            match step.compensate().await {
                Ok(()) => debug!(saga = self.name, step = step.label(), "step compensated"),
                Err(e) => error!(
                    saga = self.name,
                    step = step.label(),
                    error = %e,
                    "compensation failed"
                ),
            }
        }

        Err(failure)
    }
}

/// Sets fields on matching documents; compensation replays recorded
/// `(filter, set)` pairs that restore the previous values.
pub struct UpdateStep {
    label: String,
    collection: Arc<dyn Collection>,
    filter: Value,
    set: Document,
    restore: Vec<(Value, Document)>,
}

impl UpdateStep {
    /// Creates a step that applies `set` to documents matching `filter`.
    pub fn new(collection: Arc<dyn Collection>, filter: Value, set: Document) -> Self {
        Self {
            label: format!("update {}", collection.name()),
            collection,
            filter,
            set,
            restore: Vec::new(),
        }
    }

    /// Adds an update to replay on compensation.
    pub fn restore_with(mut self, filter: Value, set: Document) -> Self {
        self.restore.push((filter, set));
        self
    }
}

#[async_trait]
impl SagaStep for UpdateStep {
    fn label(&self) -> &str {
        &self.label
    }

    async fn execute(&mut self) -> Result<()> {
        let result = self.collection.update_many(&self.filter, &self.set).await?;
        debug!(
            step = %self.label,
            matched = result.matched,
            modified = result.modified,
            "update applied"
        );
        Ok(())
    }

    async fn compensate(&mut self) -> Result<()> {
        for (filter, set) in &self.restore {
            self.collection.update_many(filter, set).await?;
        }
        Ok(())
    }
}

/// Inserts documents keyed on `id`; compensation deletes them again.
///
/// A failed insert removes the documents this step already wrote before the
/// error is returned.
pub struct InsertStep {
    label: String,
    collection: Arc<dyn Collection>,
    documents: Vec<Document>,
    inserted: Vec<Value>,
}

impl InsertStep {
    /// Creates a step that inserts `documents` in order.
    pub fn new(collection: Arc<dyn Collection>, documents: Vec<Document>) -> Self {
        Self {
            label: format!("insert {}", collection.name()),
            collection,
            documents,
            inserted: Vec::new(),
        }
    }

    async fn remove_inserted(&mut self) -> Result<()> {
        if self.inserted.is_empty() {
            return Ok(());
        }
        let filter = json!({ "id": { "$in": self.inserted } });
        let removed = self.collection.delete_many(&filter).await?;
        debug!(step = %self.label, removed, "inserts removed");
        self.inserted.clear();
        Ok(())
    }
}

#[async_trait]
impl SagaStep for InsertStep {
    fn label(&self) -> &str {
        &self.label
    }

    async fn execute(&mut self) -> Result<()> {
        for document in self.documents.clone() {
            let id = document.get("id").cloned().unwrap_or(Value::Null);
            if let Err(e) = self.collection.insert_one(document).await {
                if let Err(undo) = self.remove_inserted().await {
                    error!(step = %self.label, error = %undo, "partial insert left behind");
                }
                return Err(e.into());
            }
            self.inserted.push(id);
        }
        debug!(step = %self.label, inserted = self.inserted.len(), "inserts applied");
        Ok(())
    }

    async fn compensate(&mut self) -> Result<()> {
        self.remove_inserted().await
    }
}
