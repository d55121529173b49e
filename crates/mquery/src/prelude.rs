//! Prelude module for convenient imports.
//!
//! ```
//! use mquery::prelude::*;
//!
//! // Now you have access to:
//! // - CallerContext, Role, Roles (caller identity)
//! // - Filter, FilterParser, SortSpec, SortKey (parsing)
//! // - QueryPipeline, ListQuery, CompiledQuery (compilation)
//! // - Collection, MemoryCollection, paginate, PageRequest (storage)
//! ```

// Caller types
pub use crate::caller::{CallerContext, CallerError, Role, Roles};

// Parsing
pub use crate::filter::{
    ErrorKind, Filter, FilterError, FilterParser, QueryError, QueryParam, Scalar, SortDirection,
    SortKey, SortSpec,
};

// Compilation
pub use crate::compile::{compile, compile_filter, compile_sort, CompiledQuery};
pub use crate::pipeline::{ListQuery, QueryPipeline};
pub use crate::schema::{FieldSet, GROUP_FIELDS, USER_FIELDS};
pub use crate::visibility::{augment, Resource};

// Storage and paging
pub use crate::collation::Collation;
pub use crate::page::{
    paginate, PageError, PageRequest, PageResult, PageSize, PaginateOptions, TotalPagePolicy,
};
pub use crate::store::{
    Collection, Document, FindOptions, MemoryCollection, StoreError, StoreResult, UpdateResult,
};
