//! Tenant-scoped document query core.
//!
//! Parses the compact `query`/`sort` language used by list endpoints,
//! narrows the result to what a caller may see, compiles it into a
//! document-store predicate and pages through a [`store::Collection`].
//!
//! # Quick Start
//!
//! ```
//! use mquery::prelude::*;
//!
//! let caller = CallerContext::new("u1", Roles::new([Role::TenantAdmin]), Some("T1".into())).unwrap();
//! let list = ListQuery::new(Some("eq(name,Sales)".into()), Some("-created_time".into()));
//! let compiled = QueryPipeline::default()
//!     .prepare(&list, &caller, Resource::Group)
//!     .unwrap();
//! assert_eq!(compiled.sort, vec![SortKey::desc("created_time")]);
//! ```

pub mod caller;
pub mod collation;
pub mod compile;
pub mod filter;
pub mod page;
pub mod pipeline;
pub mod prelude;
pub mod schema;
pub mod store;
pub mod visibility;
