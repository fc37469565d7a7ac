//! Deferred queries handed to a [`Store`](super::Store)
//!
//! A [`Query`] is a description, not a result: building one never touches
//! the store. Stores evaluate it through [`Query::matches`] and
//! [`Query::ordering`], or translate it into their own query language.

use std::fmt;
use std::sync::Arc;

use crate::accessor::{accessors, Schema};
use crate::query::{OrderBy, Predicate};

use super::traits::Entity;

/// Filter, ordering and loading options for one read
///
/// Soft-deleted rows are excluded unless [`Query::with_deleted`] is set.
/// Entities without an `is_deleted` field are never filtered that way.
///
/// # Example
///
/// ```rust,ignore
/// let query = Query::<User>::new()
///     .filter(Predicate::new(|u: &User| u.active))
///     .order_by(OrderBy::asc(|u: &User| u.email.clone()))
///     .include("roles");
/// ```
pub struct Query<T> {
    schema: Arc<Schema<T>>,
    predicates: Vec<Predicate<T>>,
    order_by: Option<OrderBy<T>>,
    includes: Vec<String>,
    with_deleted: bool,
    tracked: bool,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            predicates: self.predicates.clone(),
            order_by: self.order_by.clone(),
            includes: self.includes.clone(),
            with_deleted: self.with_deleted,
            tracked: self.tracked,
        }
    }
}

impl<T: 'static> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &self.schema.entity())
            .field("predicates", &self.predicates.len())
            .field("ordered", &self.order_by.is_some())
            .field("includes", &self.includes)
            .field("with_deleted", &self.with_deleted)
            .field("tracked", &self.tracked)
            .finish()
    }
}

impl<T: Entity> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Query<T> {
    /// Every non-deleted row in natural order
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: accessors::<T>(),
            predicates: Vec::new(),
            order_by: None,
            includes: Vec::new(),
            with_deleted: false,
            tracked: false,
        }
    }

    /// Add a predicate; all predicates must hold
    #[must_use]
    pub fn filter(mut self, predicate: Predicate<T>) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Replace the ordering
    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy<T>) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Request a related collection to be loaded with each row
    #[must_use]
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        let relation = relation.into();
        if !self.includes.contains(&relation) {
            self.includes.push(relation);
        }
        self
    }

    /// Include soft-deleted rows
    #[must_use]
    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    /// Hint that returned rows will be modified and written back
    #[must_use]
    pub fn tracked(mut self, tracked: bool) -> Self {
        self.tracked = tracked;
        self
    }

    /// Whether `item` belongs to the result
    pub fn matches(&self, item: &T) -> bool {
        (self.with_deleted || !self.schema.is_deleted(item))
            && self.predicates.iter().all(|p| p.evaluate(item))
    }

    /// Ordering, if any
    pub fn ordering(&self) -> Option<&OrderBy<T>> {
        self.order_by.as_ref()
    }

    /// Requested relations
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Whether soft-deleted rows are included
    pub fn includes_deleted(&self) -> bool {
        self.with_deleted
    }

    /// Whether the caller asked for tracked rows
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Filter and order an in-memory sequence
    pub fn apply(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let mut selected: Vec<T> = items.into_iter().filter(|item| self.matches(item)).collect();
        if let Some(order_by) = &self.order_by {
            order_by.sort(&mut selected);
        }
        selected
    }
}
