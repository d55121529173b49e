//! Tenant existence checks and user counters.

use std::sync::Arc;

use async_trait::async_trait;
use mquery::store::{Collection, Document, FindOptions, MemoryCollection};
use serde_json::{json, Value};
use tenant_api::client::TenantClient;
use tenant_api::models::{Tenant, UserIncrement};
use tracing::debug;

use crate::models::to_document;
use crate::saga::SagaStep;
use crate::services::{decode, Result};

/// Looks up tenants by code and keeps their user counters.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Returns the tenant with `code`, or `None` if there is no such tenant.
    async fn tenant_by_code(&self, code: &str) -> Result<Option<Tenant>>;

    /// Returns the tenants among `codes` that exist. Unknown codes are
    /// skipped.
    async fn tenants_by_codes(&self, codes: &[String]) -> Result<Vec<Tenant>>;

    /// Applies per-tenant changes to `number_of_user`.
    async fn increase_users(&self, increments: &[UserIncrement]) -> Result<()>;
}

#[async_trait]
impl TenantDirectory for TenantClient {
    async fn tenant_by_code(&self, code: &str) -> Result<Option<Tenant>> {
        Ok(self.get_tenant_by_code(code).await?)
    }

    async fn tenants_by_codes(&self, codes: &[String]) -> Result<Vec<Tenant>> {
        Ok(self.get_tenants_by_codes(codes).await?)
    }

    async fn increase_users(&self, increments: &[UserIncrement]) -> Result<()> {
        Ok(self.increase_user(increments).await?)
    }
}

/// Tenants kept in a collection, used when no tenant service is configured.
#[derive(Clone)]
pub struct CollectionTenants {
    tenants: Arc<dyn Collection>,
}

impl CollectionTenants {
    /// Creates a directory over a collection of tenant documents.
    pub fn new(tenants: Arc<dyn Collection>) -> Self {
        Self { tenants }
    }

    /// Creates a directory over an in-memory copy of `tenants`.
    pub fn with_tenants(tenants: &[Tenant]) -> serde_json::Result<Self> {
        let documents = tenants
            .iter()
            .map(to_document)
            .collect::<serde_json::Result<Vec<_>>>()?;
        let collection = MemoryCollection::with_documents("tenants", documents).unique_on("code");
        Ok(Self::new(Arc::new(collection)))
    }
}

#[async_trait]
impl TenantDirectory for CollectionTenants {
    async fn tenant_by_code(&self, code: &str) -> Result<Option<Tenant>> {
        let tenants = self.tenants.as_ref();
        tenants
            .find_one(&json!({ "code": code }))
            .await?
            .map(|doc| decode(tenants, doc))
            .transpose()
    }

    async fn tenants_by_codes(&self, codes: &[String]) -> Result<Vec<Tenant>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let tenants = self.tenants.as_ref();
        tenants
            .find(&json!({ "code": { "$in": codes } }), &FindOptions::all())
            .await?
            .into_iter()
            .map(|doc| decode(tenants, doc))
            .collect()
    }

    async fn increase_users(&self, increments: &[UserIncrement]) -> Result<()> {
        for increment in UserIncrement::merge(increments.iter().cloned()) {
            let Some(tenant) = self.tenant_by_code(&increment.tenant).await? else {
                debug!(tenant = %increment.tenant, "skipping counter of unknown tenant");
                continue;
            };
            let count = tenant.number_of_user.saturating_add_signed(increment.amount);

            let mut set = Document::new();
            set.insert("number_of_user".into(), Value::from(count));
            self.tenants
                .update_many(&json!({ "code": tenant.code }), &set)
                .await?;
        }
        Ok(())
    }
}

/// Saga step that adds users to tenant counters and takes them off again
/// on compensation.
pub struct CounterStep {
    directory: Arc<dyn TenantDirectory>,
    increments: Vec<UserIncrement>,
}

impl CounterStep {
    /// Creates a step applying `increments`, merged per tenant.
    pub fn new(directory: Arc<dyn TenantDirectory>, increments: Vec<UserIncrement>) -> Self {
        Self {
            directory,
            increments: UserIncrement::merge(increments),
        }
    }
}

#[async_trait]
impl SagaStep for CounterStep {
    fn label(&self) -> &str {
        "increase tenant users"
    }

    async fn execute(&mut self) -> Result<()> {
        self.directory.increase_users(&self.increments).await
    }

    async fn compensate(&mut self) -> Result<()> {
        let undo: Vec<UserIncrement> = self
            .increments
            .iter()
            .map(|i| UserIncrement::new(i.tenant.clone(), -i.amount))
            .collect();
        self.directory.increase_users(&undo).await
    }
}
