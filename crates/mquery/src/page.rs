//! Windowed reads with page metadata.
//!
//! A page is computed from two reads issued together: a count over the whole
//! filter and a skip/limit slice of the sorted matches.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::collation::Collation;
use crate::compile::CompiledQuery;
use crate::store::{Collection, Document, FindOptions, StoreResult};

/// Size value that requests every match in a single page.
pub const UNPAGED: i64 = -1;

/// Errors for malformed page parameters.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PageError {
    /// Size below -1.
    #[error("invalid page size {0} (expected -1 or a non-negative number)")]
    InvalidSize(i64),

    /// Negative page index.
    #[error("invalid page {0} (expected a non-negative number)")]
    InvalidPage(i64),
}

/// How many rows a page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// Every match, no window.
    Unpaged,
    /// At most this many rows.
    Limit(u64),
}

/// A zero-based page index and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    size: PageSize,
}

impl PageRequest {
    /// Creates a request for page `page` of `size` rows.
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page,
            size: PageSize::Limit(size),
        }
    }

    /// Creates a request for every match.
    pub fn unpaged() -> Self {
        Self {
            page: 0,
            size: PageSize::Unpaged,
        }
    }

    /// Validates raw request parameters, where `size == -1` means unpaged.
    pub fn from_raw(page: i64, size: i64) -> Result<Self, PageError> {
        let page = u64::try_from(page).map_err(|_| PageError::InvalidPage(page))?;
        match size {
            UNPAGED => Ok(Self {
                page,
                size: PageSize::Unpaged,
            }),
            n if n < UNPAGED => Err(PageError::InvalidSize(n)),
            n => Ok(Self::new(page, n.unsigned_abs())),
        }
    }

    /// Returns the page index.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Returns the page size.
    pub fn size(&self) -> PageSize {
        self.size
    }

    fn window(&self) -> (u64, Option<u64>) {
        match self.size {
            PageSize::Unpaged => (0, None),
            PageSize::Limit(size) => (size.saturating_mul(self.page), Some(size)),
        }
    }
}

/// How `total_page` is reported when nothing matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalPagePolicy {
    /// `ceil(total / size)`, so zero when nothing matches.
    #[default]
    Exact,
    /// Like `Exact`, but never below one for a non-zero page size.
    AtLeastOne,
}

impl TotalPagePolicy {
    /// Computes the number of pages for `total` rows.
    pub fn total_pages(&self, total: u64, size: PageSize) -> u64 {
        match size {
            PageSize::Unpaged => 1,
            PageSize::Limit(0) => 0,
            PageSize::Limit(size) => {
                let pages = total.div_ceil(size);
                match self {
                    TotalPagePolicy::Exact => pages,
                    TotalPagePolicy::AtLeastOne => pages.max(1),
                }
            }
        }
    }
}

/// Read options shared by every page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginateOptions {
    /// String ordering used by the sorted read.
    pub collation: Collation,
    /// How `total_page` is reported.
    pub policy: TotalPagePolicy,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    /// Zero-based page index, echoed from the request.
    pub page: u64,
    /// Number of matches across all pages.
    pub total: u64,
    /// Number of pages.
    pub total_page: u64,
    /// Rows of this page.
    pub data: Vec<T>,
}

impl<T> PageResult<T> {
    /// Transforms every row, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            page: self.page,
            total: self.total,
            total_page: self.total_page,
            data: self.data.into_iter().map(f).collect(),
        }
    }

    /// Transforms every row with a fallible function.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PageResult<U>, E> {
        Ok(PageResult {
            page: self.page,
            total: self.total,
            total_page: self.total_page,
            data: self.data.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

/// Reads one page of `query` from `collection`.
///
/// The count and the slice are awaited together; if either fails the other
/// is dropped and the error is returned.
///
/// # Example
///
/// ```
/// use mquery::compile::CompiledQuery;
/// use mquery::page::{paginate, PageRequest, PaginateOptions};
/// use mquery::store::MemoryCollection;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let empty = MemoryCollection::new("groups");
/// let query = CompiledQuery::match_all();
/// let page = paginate(&empty, &query, PageRequest::new(0, 10), &PaginateOptions::default())
///     .await
///     .unwrap();
/// assert_eq!((page.total, page.total_page), (0, 0));
/// # });
/// ```
pub async fn paginate(
    collection: &dyn Collection,
    query: &CompiledQuery,
    request: PageRequest,
    options: &PaginateOptions,
) -> StoreResult<PageResult<Document>> {
    if request.size == PageSize::Limit(0) {
        let total = collection.count(&query.filter).await?;
        return Ok(PageResult {
            page: request.page,
            total,
            total_page: 0,
            data: Vec::new(),
        });
    }

    let (skip, limit) = request.window();
    let find_options = FindOptions {
        sort: query.sort.clone(),
        skip,
        limit,
        collation: options.collation,
    };

    let (total, data) = tokio::try_join!(
        collection.count(&query.filter),
        collection.find(&query.filter, &find_options),
    )?;

    let total_page = options.policy.total_pages(total, request.size);
    debug!(
        collection = collection.name(),
        page = request.page,
        total,
        total_page,
        rows = data.len(),
        "paginated read"
    );

    Ok(PageResult {
        page: request.page,
        total,
        total_page,
        data,
    })
}
