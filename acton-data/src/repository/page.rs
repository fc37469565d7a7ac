//! Pagination over deferred queries and in-memory sequences
//!
//! Pages are addressed by `index` relative to a base index `from` (0 for
//! zero-based paging, 1 for one-based). For a source of `count` records and
//! a page size `size`:
//!
//! - `pages = ceil(count / size)`
//! - the page starts at record `(index - from) * size`, clamped to `count`
//! - `has_previous = index - from > 0`
//! - `has_next = index - from + 1 < pages`
//!
//! # Example
//!
//! ```rust
//! use acton_data::repository::{IntoPage, PageRequest};
//!
//! let page = (1..=10).into_page(PageRequest::new(2, 3)).unwrap();
//! assert_eq!(page.items, vec![7, 8, 9]);
//! assert_eq!(page.pages, 4);
//! assert!(page.has_previous && page.has_next);
//! ```

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::query::QueryError;

use super::error::{RepositoryError, RepositoryOperation};
use super::query::Query;
use super::traits::{Entity, RepositoryResult, Store, Window};

/// Which page to load
///
/// # Example
///
/// ```rust
/// use acton_data::repository::PageRequest;
///
/// // Third page of 20 with one-based page numbers
/// let request = PageRequest::new(3, 20).with_from(1);
/// assert!(request.validate().is_ok());
///
/// // Page 0 does not exist when pages start at 1
/// assert!(PageRequest::new(0, 20).with_from(1).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Requested page, counted from `from`
    pub index: usize,
    /// Records per page
    pub size: usize,
    /// Index of the first page
    #[serde(default)]
    pub from: usize,
}

impl PageRequest {
    /// Page `index` of `size` records, zero-based
    #[must_use]
    pub const fn new(index: usize, size: usize) -> Self {
        Self {
            index,
            size,
            from: 0,
        }
    }

    /// The first zero-based page of `size` records
    #[must_use]
    pub const fn first(size: usize) -> Self {
        Self::new(0, size)
    }

    /// Set the index of the first page
    #[must_use]
    pub const fn with_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    /// Reject `from > index` and `size == 0`
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.from > self.index || self.size == 0 {
            return Err(QueryError::InvalidPageRange {
                index: self.index,
                size: self.size,
                from: self.from,
            });
        }
        Ok(())
    }

    /// Position of the page among all pages, starting at 0
    #[must_use]
    pub const fn offset_pages(&self) -> usize {
        self.index.saturating_sub(self.from)
    }

    /// Records to skip and take from a source of `total` records
    #[must_use]
    pub fn window(&self, total: usize) -> Window {
        let skip = self.offset_pages().saturating_mul(self.size).min(total);
        Window::new(skip, self.size)
    }
}

/// One page of results with navigation metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Page index, counted from `from`
    pub index: usize,
    /// Requested page size
    pub size: usize,
    /// Index of the first page
    pub from: usize,
    /// Total records across all pages
    pub count: usize,
    /// Total number of pages
    pub pages: usize,
    /// Records on this page
    pub items: Vec<T>,
    /// Whether a page precedes this one
    pub has_previous: bool,
    /// Whether a page follows this one
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Assemble a page from an already validated request
    pub fn new(request: PageRequest, count: usize, items: Vec<T>) -> Self {
        let pages = if request.size == 0 {
            0
        } else {
            count.div_ceil(request.size)
        };
        let position = request.offset_pages();
        Self {
            index: request.index,
            size: request.size,
            from: request.from,
            count,
            pages,
            items,
            has_previous: position > 0,
            has_next: position < pages.saturating_sub(1),
        }
    }

    /// Total records across all pages
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.count
    }

    /// Whether this is the first page
    #[must_use]
    pub fn is_first_page(&self) -> bool {
        !self.has_previous
    }

    /// Whether this is the last page
    #[must_use]
    pub fn is_last_page(&self) -> bool {
        !self.has_next
    }

    /// Whether the page holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Transform the items, keeping the metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            index: self.index,
            size: self.size,
            from: self.from,
            count: self.count,
            pages: self.pages,
            items: self.items.into_iter().map(f).collect(),
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }
}

/// Load one page of a deferred query
///
/// The request is validated before the store is touched. The store is then
/// asked for the total count and for the page's window, in that order.
///
/// # Errors
///
/// `InvalidPageRange` for a bad request, otherwise whatever the store
/// reports.
pub async fn paginate<T, S>(
    store: &S,
    query: &Query<T>,
    request: PageRequest,
    cancel: &CancellationToken,
) -> RepositoryResult<Page<T>>
where
    T: Entity,
    S: Store<T>,
{
    request
        .validate()
        .map_err(|e| RepositoryError::from(e).with_operation(RepositoryOperation::FindAll))?;

    let total = usize::try_from(store.count(query, cancel).await?).unwrap_or(usize::MAX);
    let window = request.window(total);
    let items = if window.skip >= total {
        Vec::new()
    } else {
        store.fetch(query, Some(window), cancel).await?
    };

    tracing::debug!(
        entity = T::NAME,
        index = request.index,
        size = request.size,
        total,
        returned = items.len(),
        "Page loaded"
    );
    Ok(Page::new(request, total, items))
}

/// Page through a materialized sequence
pub fn paginate_iter<I>(items: I, request: PageRequest) -> Result<Page<I::Item>, QueryError>
where
    I: IntoIterator,
{
    request.validate()?;
    let all: Vec<I::Item> = items.into_iter().collect();
    let total = all.len();
    let window = request.window(total);
    let page_items = all.into_iter().skip(window.skip).take(window.take).collect();
    Ok(Page::new(request, total, page_items))
}

/// Extension for paging any iterable
pub trait IntoPage: IntoIterator + Sized {
    /// See [`paginate_iter`]
    fn into_page(self, request: PageRequest) -> Result<Page<Self::Item>, QueryError> {
        paginate_iter(self, request)
    }
}

impl<I: IntoIterator> IntoPage for I {}
