//! Multi-key orderings
//!
//! [`compile_sorts`] turns a list of [`Sort`] keys into one [`OrderBy`]
//! comparator. Keys are applied by ascending `priority`; keys with equal
//! priority keep their input order, so a list that never sets `priority` is
//! applied exactly as written.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::accessor::{accessors, Describe};

use super::error::QueryError;
use super::model::Sort;

/// A composed comparator over records of type `T`
pub struct OrderBy<T>(Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>);

impl<T> Clone for OrderBy<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for OrderBy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrderBy(..)")
    }
}

impl<T: 'static> OrderBy<T> {
    /// Wrap a comparator closure
    pub fn from_fn(compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        Self(Arc::new(compare))
    }

    pub(crate) fn from_shared(compare: Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>) -> Self {
        Self(compare)
    }

    /// Ascending by a key
    pub fn asc<K: Ord>(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        Self::from_fn(move |a, b| key(a).cmp(&key(b)))
    }

    /// Descending by a key
    pub fn desc<K: Ord>(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        Self::asc(key).reverse()
    }

    /// Break ties with `next`
    #[must_use]
    pub fn then(self, next: OrderBy<T>) -> Self {
        Self::from_fn(move |a, b| self.compare(a, b).then_with(|| next.compare(a, b)))
    }

    /// Invert the ordering
    #[must_use]
    pub fn reverse(self) -> Self {
        Self::from_fn(move |a, b| self.compare(b, a))
    }

    /// Compare two records
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.0)(a, b)
    }

    /// Sort in place; records that compare equal keep their relative order
    pub fn sort(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

/// Compile sort keys against the registered fields of `T`
///
/// Returns `Ok(None)` for an empty list, leaving the store's natural order
/// in place. A `dir` other than `asc` (any case) sorts descending.
///
/// # Errors
///
/// [`QueryError::UnknownField`] when a key names an unregistered field.
pub fn compile_sorts<T: Describe>(sorts: &[Sort]) -> Result<Option<OrderBy<T>>, QueryError> {
    if sorts.is_empty() {
        return Ok(None);
    }

    let schema = accessors::<T>();
    let mut keys: Vec<&Sort> = sorts.iter().collect();
    keys.sort_by_key(|sort| sort.priority);

    let mut composed: Option<OrderBy<T>> = None;
    for sort in keys {
        let accessor = schema.field(sort.field.trim())?;
        let dir = sort.dir.trim();
        if !dir.eq_ignore_ascii_case("asc") && !dir.eq_ignore_ascii_case("desc") {
            tracing::warn!(
                entity = T::NAME,
                field = accessor.name(),
                dir = %sort.dir,
                "Unrecognized sort direction, sorting descending"
            );
        }
        let key = accessor.order(sort.direction());
        composed = Some(match composed {
            Some(primary) => primary.then(key),
            None => key,
        });
    }
    Ok(composed)
}
