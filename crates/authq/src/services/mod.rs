//! Group and user services.
//!
//! Services combine the query pipeline with the storage collections and the
//! tenant directory. Every operation takes the [`CallerContext`] it runs for.

mod groups;
mod users;

use std::sync::Arc;

use mquery::caller::CallerContext;
use mquery::collation::Collation;
use mquery::filter::{FilterError, QueryError, DEFAULT_MAX_DEPTH};
use mquery::page::{paginate, PageError, PageRequest, PageResult, PaginateOptions, TotalPagePolicy};
use mquery::pipeline::{ListQuery, QueryPipeline};
use mquery::store::{Collection, Document, FindOptions, StoreError};
use mquery::visibility::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{from_document, to_document, User};
use crate::tenants::TenantDirectory;

pub use groups::{GroupService, GroupUpdate, NewGroup};
pub use users::{
    ActivationResult, ImportIssue, ImportIssueKind, ImportResult, NewUser, UserImport,
    UserService, UserUpdate,
};

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Errors returned by the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The `query` or `sort` parameter was rejected.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// An internally built filter was rejected.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The page window was rejected.
    #[error(transparent)]
    Page(#[from] PageError),

    /// Storage failure, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Tenant service failure.
    #[error(transparent)]
    Tenant(#[from] tenant_api::error::Error),

    /// The entity does not exist or is not visible to the caller.
    #[error("the {resource} {id} does not exist")]
    NotFound { resource: &'static str, id: String },

    /// The caller may not perform the action.
    #[error("action not allowed")]
    Forbidden,

    /// Input failed a business rule.
    #[error("invalid {param}: {message}")]
    InvalidData {
        param: &'static str,
        value: Value,
        message: String,
    },

    /// An active group with the same name already exists in the tenant.
    #[error("group name already exists: {0}")]
    NameTaken(String),

    /// Another user already registered the email address.
    #[error("email already registered: {0}")]
    EmailTaken(String),

    /// Rows of a user import failed validation; nothing was written.
    #[error("invalid import data: {}", summarize(.0))]
    InvalidImport(Vec<ImportIssue>),

    /// A stored document does not have the expected shape.
    #[error("malformed {collection} document: {source}")]
    Decode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ServiceError {
    pub(crate) fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub(crate) fn invalid(param: &'static str, value: impl Into<Value>, message: String) -> Self {
        ServiceError::InvalidData {
            param,
            value: value.into(),
            message,
        }
    }

    /// Returns a stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Query(_) | ServiceError::Filter(_) | ServiceError::Page(_) => {
                "INVALID_QUERY"
            }
            ServiceError::Store(_) | ServiceError::Decode { .. } => "STORAGE_ERROR",
            ServiceError::Tenant(_) => "TENANT_SERVICE_ERROR",
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::Forbidden => "ACTION_NOT_ALLOWED",
            ServiceError::InvalidData { .. }
            | ServiceError::NameTaken(_)
            | ServiceError::InvalidImport(_) => "INVALID_DATA",
            ServiceError::EmailTaken(_) => "REGISTERED_EMAIL",
        }
    }

    /// Returns structured details for errors that carry them.
    pub fn details(&self) -> Option<Value> {
        match self {
            ServiceError::InvalidData { param, value, .. } => {
                Some(json!([{ "param": param, "value": value }]))
            }
            ServiceError::EmailTaken(email) => Some(json!([{ "param": "email", "value": email }])),
            ServiceError::InvalidImport(issues) => serde_json::to_value(issues).ok(),
            _ => None,
        }
    }
}

fn summarize(issues: &[ImportIssue]) -> String {
    issues
        .iter()
        .map(|issue| {
            let rows: Vec<String> = issue.rows.iter().map(usize::to_string).collect();
            format!("{} (rows {})", issue.code.code(), rows.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// The collections the services read and write.
#[derive(Clone)]
pub struct Collections {
    pub users: Arc<dyn Collection>,
    pub accounts: Arc<dyn Collection>,
    pub groups: Arc<dyn Collection>,
}

/// Parameters of a list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindParams {
    pub query: Option<String>,
    pub sort: Option<String>,
    pub page: i64,
    /// Rows per page; `-1` returns every match.
    pub size: i64,
}

impl Default for FindParams {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

impl FindParams {
    /// Creates parameters without a query or sort.
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            query: None,
            sort: None,
            page,
            size,
        }
    }

    /// Sets the query expression.
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the sort expression.
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    fn list_query(&self) -> ListQuery {
        ListQuery::new(self.query.clone(), self.sort.clone())
    }
}

/// Tuning for list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySettings {
    pub max_depth: usize,
    pub collation: Collation,
    pub policy: TotalPagePolicy,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            collation: Collation::Vietnamese,
            policy: TotalPagePolicy::Exact,
        }
    }
}

impl QuerySettings {
    /// Parses, scopes and pages `params` over `collection`.
    pub(crate) async fn find_page(
        &self,
        collection: &dyn Collection,
        caller: &CallerContext,
        resource: Resource,
        params: &FindParams,
    ) -> Result<PageResult<Document>> {
        let request = PageRequest::from_raw(params.page, params.size)?;
        let compiled = QueryPipeline::with_max_depth(self.max_depth).prepare(
            &params.list_query(),
            caller,
            resource,
        )?;
        let options = PaginateOptions {
            collation: self.collation,
            policy: self.policy,
        };
        Ok(paginate(collection, &compiled, request, &options).await?)
    }
}

/// Decodes a stored document, naming the collection on failure.
pub(crate) fn decode<T: DeserializeOwned>(collection: &dyn Collection, document: Document) -> Result<T> {
    from_document(document).map_err(|source| ServiceError::Decode {
        collection: collection.name().to_string(),
        source,
    })
}

/// Fails unless `tenant` exists and is active.
pub(crate) async fn check_tenant(directory: &dyn TenantDirectory, tenant: &str) -> Result<()> {
    match directory.tenant_by_code(tenant).await? {
        None => Err(ServiceError::invalid(
            "tenant",
            tenant,
            format!("tenant {tenant} does not exist"),
        )),
        Some(t) if !t.is_active => Err(ServiceError::invalid(
            "tenant",
            tenant,
            format!("tenant {tenant} is inactive"),
        )),
        Some(_) => Ok(()),
    }
}

/// Encodes a value for `collection`, naming the collection on failure.
pub(crate) fn encode<T: Serialize>(collection: &dyn Collection, value: &T) -> Result<Document> {
    to_document(value).map_err(|source| ServiceError::Decode {
        collection: collection.name().to_string(),
        source,
    })
}

/// Loads the users with the given ids, in storage order.
pub(crate) async fn users_by_ids(users: &dyn Collection, ids: &[String]) -> Result<Vec<User>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    users
        .find(&json!({ "id": { "$in": ids } }), &FindOptions::all())
        .await?
        .into_iter()
        .map(|doc| decode(users, doc))
        .collect()
}

/// Removes repeated ids, keeping the first occurrence.
pub(crate) fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(id.clone());
        }
    }
    unique
}
