//! Translation of parsed expressions into document-store predicates.
//!
//! The output follows the familiar document-filter shape: `{"$and": [...]}`,
//! `{"$or": [...]}`, `{field: value}` for equality and
//! `{field: {"$ne": value}}` for inequality. Every field is checked against a
//! [`FieldSet`] first, so nothing outside the allowlist reaches the backend.

use serde_json::{json, Map, Value};

use crate::filter::{Comparison, ComparisonOp, Filter, FilterError, FilterResult, SortKey, SortSpec};
use crate::schema::FieldSet;

/// A predicate and sort ready to run against a collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    /// Document filter. An empty object matches everything.
    pub filter: Value,
    /// Sort keys, primary first, with duplicates resolved.
    pub sort: Vec<SortKey>,
}

impl CompiledQuery {
    /// Creates a query from an already compiled filter and sort.
    pub fn new(filter: Value, sort: Vec<SortKey>) -> Self {
        Self { filter, sort }
    }

    /// A query that matches every document, unsorted.
    pub fn match_all() -> Self {
        Self {
            filter: Value::Object(Map::new()),
            sort: Vec::new(),
        }
    }

    /// Replaces the sort keys.
    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }
}

/// Compiles a filter into a query with no sort.
///
/// # Errors
///
/// Returns `FilterError::UnknownField` for the first comparison whose field is
/// not in `schema`.
pub fn compile(expr: &Filter, schema: &FieldSet) -> FilterResult<CompiledQuery> {
    Ok(CompiledQuery::new(compile_filter(expr, schema)?, Vec::new()))
}

/// Compiles a filter tree into a document predicate.
pub fn compile_filter(expr: &Filter, schema: &FieldSet) -> FilterResult<Value> {
    match expr {
        Filter::And(children) => Ok(json!({ "$and": compile_children(children, schema)? })),
        Filter::Or(children) => Ok(json!({ "$or": compile_children(children, schema)? })),
        Filter::Comparison(comparison) => compile_comparison(comparison, schema),
    }
}

fn compile_children(children: &[Filter], schema: &FieldSet) -> FilterResult<Vec<Value>> {
    children
        .iter()
        .map(|child| compile_filter(child, schema))
        .collect()
}

fn compile_comparison(comparison: &Comparison, schema: &FieldSet) -> FilterResult<Value> {
    check_field(&comparison.field, schema)?;

    let value = comparison.value.to_json();
    let condition = match comparison.op {
        ComparisonOp::Eq => value,
        ComparisonOp::Ne => json!({ "$ne": value }),
    };

    let mut predicate = Map::new();
    predicate.insert(comparison.field.clone(), condition);
    Ok(Value::Object(predicate))
}

/// Validates sort fields and resolves duplicates.
///
/// # Errors
///
/// Returns `FilterError::UnknownField` for the first field not in `schema`.
pub fn compile_sort(sort: &SortSpec, schema: &FieldSet) -> FilterResult<Vec<SortKey>> {
    let keys = sort.normalized();
    for key in &keys {
        check_field(&key.field, schema)?;
    }
    Ok(keys)
}

fn check_field(field: &str, schema: &FieldSet) -> FilterResult<()> {
    if schema.contains(field) {
        Ok(())
    } else {
        Err(FilterError::unknown_field(field, schema.suggest(field)))
    }
}
