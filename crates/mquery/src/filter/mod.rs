//! Query expression and sort parsers.
//!
//! List endpoints accept a `query` parameter written in a small prefix
//! language, and a `sort` parameter listing fields with directions.
//!
//! # Query Syntax
//!
//! ## Comparisons
//! - `eq(field,value)` - field equals value (array fields: contains value)
//! - `ne(field,value)` - field does not equal value
//!
//! ## Boolean Operators
//! - `and(e1,e2,...)` - every child matches
//! - `or(e1,e2,...)` - at least one child matches
//!
//! ## Values
//! - `true`, `false`, `null` and numbers are typed by shape
//! - `"quoted"` or `'quoted'` strings keep `(`, `)` and `,` literally
//! - anything else is a string
//!
//! Fields may be dotted paths (`tenant.code`). Function names are
//! case-insensitive.
//!
//! # Sort Syntax
//!
//! Comma-separated fields, each optionally prefixed with `+`/`-` or suffixed
//! with `:asc`, `:desc`, `:1` or `:-1`.
//!
//! # Example
//!
//! ```
//! use mquery::filter::{Filter, FilterParser, SortKey, SortSpec};
//!
//! let filter = FilterParser::parse("or(eq(name,Sales),ne(leader_id,null))").unwrap();
//! assert_eq!(filter.depth(), 2);
//!
//! let sort = SortSpec::parse("-created_time,name").unwrap();
//! assert_eq!(sort.keys()[0], SortKey::desc("created_time"));
//! ```

mod ast;
mod error;
mod lexer;
mod parser;
mod sort;

pub use ast::{Comparison, ComparisonOp, Filter, Scalar};
pub use error::{ErrorKind, FilterError, FilterResult, QueryError, QueryParam};
pub use lexer::{Lexer, PositionedToken, QueryToken};
pub use parser::{FilterParser, DEFAULT_MAX_DEPTH};
pub use sort::{SortDirection, SortKey, SortSpec};
