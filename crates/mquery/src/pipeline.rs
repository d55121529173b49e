//! End-to-end preparation of a list request.
//!
//! Raw `query` and `sort` text plus the caller become a [`CompiledQuery`]:
//! parse, narrow by visibility, then compile against the resource allowlist.

use tracing::debug;

use crate::caller::CallerContext;
use crate::compile::{compile_filter, compile_sort, CompiledQuery};
use crate::filter::{FilterParser, QueryError, QueryParam, SortSpec, DEFAULT_MAX_DEPTH};
use crate::visibility::{augment, Resource};

/// Raw list parameters as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Filter expression; blank means none.
    pub query: Option<String>,
    /// Sort specification; blank means none.
    pub sort: Option<String>,
}

impl ListQuery {
    /// Creates list parameters.
    pub fn new(query: Option<String>, sort: Option<String>) -> Self {
        Self { query, sort }
    }

    fn query_text(&self) -> Option<&str> {
        non_blank(self.query.as_deref())
    }

    fn sort_text(&self) -> Option<&str> {
        non_blank(self.sort.as_deref())
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// Turns raw list parameters into a compiled, visibility-scoped query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPipeline {
    max_depth: usize,
}

impl Default for QueryPipeline {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl QueryPipeline {
    /// Creates a pipeline with a custom nesting limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Returns the nesting limit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Prepares `list` for `caller` on `resource`.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] naming the parameter and raw text that failed
    /// to parse or referenced a field outside the allowlist.
    ///
    /// # Example
    ///
    /// ```
    /// use mquery::caller::{CallerContext, Role, Roles};
    /// use mquery::pipeline::{ListQuery, QueryPipeline};
    /// use mquery::visibility::Resource;
    /// use serde_json::json;
    ///
    /// let caller = CallerContext::new("u1", Roles::new([Role::EndUser]), Some("T1".into())).unwrap();
    /// let compiled = QueryPipeline::default()
    ///     .prepare(&ListQuery::default(), &caller, Resource::Group)
    ///     .unwrap();
    /// assert_eq!(
    ///     compiled.filter,
    ///     json!({ "$and": [
    ///         { "tenant": "T1" },
    ///         { "is_active": true },
    ///         { "$or": [ { "members": "u1" }, { "leader_id": "u1" } ] }
    ///     ]})
    /// );
    /// ```
    pub fn prepare(
        &self,
        list: &ListQuery,
        caller: &CallerContext,
        resource: Resource,
    ) -> Result<CompiledQuery, QueryError> {
        let schema = resource.fields();

        let expr = match list.query_text() {
            Some(text) => Some(
                FilterParser::parse_with_max_depth(text, self.max_depth)
                    .map_err(|e| QueryError::new(QueryParam::Query, text, e))?,
            ),
            None => None,
        };

        // Check the caller's own fields before the injected ones, so errors
        // point at what the caller wrote.
        if let (Some(expr), Some(text)) = (&expr, list.query_text()) {
            compile_filter(expr, schema).map_err(|e| QueryError::new(QueryParam::Query, text, e))?;
        }

        let sort = match list.sort_text() {
            Some(text) => {
                let spec = SortSpec::parse(text)
                    .map_err(|e| QueryError::new(QueryParam::Sort, text, e))?;
                compile_sort(&spec, schema)
                    .map_err(|e| QueryError::new(QueryParam::Sort, text, e))?
            }
            None => Vec::new(),
        };

        let scoped = augment(expr, caller, resource);
        debug!(caller = caller.id(), resource = ?resource, filter = %scoped, "prepared list query");

        let filter = compile_filter(&scoped, schema).map_err(|e| {
            QueryError::new(QueryParam::Query, list.query_text().unwrap_or_default(), e)
        })?;

        Ok(CompiledQuery::new(filter, sort))
    }
}
