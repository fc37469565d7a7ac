//! Entity and store trait definitions
//!
//! This module provides the seams between the generic repository and the
//! backing store, using RPITIT (Return Position Impl Trait In Traits),
//! available since Rust 1.75.
//!
//! # Overview
//!
//! - [`Entity`]: a record with an identifier and named fields
//! - [`Identity`]: identifier types a store can generate on insert
//! - [`Store`]: a countable, fetchable source with an atomic commit
//! - [`ChangeSet`]: the unit of work handed to [`Store::commit`]
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_data::repository::{ChangeSet, Query, RepositoryResult, Store, Window};
//! use tokio_util::sync::CancellationToken;
//!
//! struct UserStore {
//!     pool: PgPool,
//! }
//!
//! impl Store<User> for UserStore {
//!     async fn count(&self, query: &Query<User>, cancel: &CancellationToken) -> RepositoryResult<u64> {
//!         // Translate the query and run SELECT COUNT(*)
//!         todo!()
//!     }
//!
//!     async fn fetch(
//!         &self,
//!         query: &Query<User>,
//!         window: Option<Window>,
//!         cancel: &CancellationToken,
//!     ) -> RepositoryResult<Vec<User>> {
//!         todo!()
//!     }
//!
//!     async fn commit(
//!         &self,
//!         changes: ChangeSet<User>,
//!         cancel: &CancellationToken,
//!     ) -> RepositoryResult<Vec<User>> {
//!         // Apply all changes in one transaction
//!         todo!()
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::hash::Hash;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::RepositoryError;
use super::query::Query;
use crate::accessor::Describe;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Identifier type of an entity
///
/// Stores use [`Identity::is_unset`] to decide whether an inserted entity
/// needs a generated identifier and [`Identity::generate`] to produce one.
pub trait Identity:
    Clone + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Whether the value is the "not yet assigned" placeholder
    fn is_unset(&self) -> bool;

    /// Produce a fresh identifier from a store-local sequence number
    ///
    /// Returns `None` when the sequence no longer fits the identifier type.
    fn generate(sequence: u64) -> Option<Self>;
}

macro_rules! integer_identity {
    ($($ty:ty),*) => {
        $(
            impl Identity for $ty {
                fn is_unset(&self) -> bool {
                    *self == 0
                }

                fn generate(sequence: u64) -> Option<Self> {
                    <$ty>::try_from(sequence).ok()
                }
            }
        )*
    };
}

integer_identity!(i32, i64, u64);

impl Identity for Uuid {
    fn is_unset(&self) -> bool {
        self.is_nil()
    }

    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::now_v7())
    }
}

impl Identity for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::now_v7().to_string())
    }
}

/// A persisted record addressed by identifier and by named fields
///
/// # Example
///
/// ```rust
/// use acton_data::accessor::{Describe, SchemaBuilder};
/// use acton_data::repository::Entity;
///
/// #[derive(Clone)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Describe for Tag {
///     const NAME: &'static str = "Tag";
///
///     fn describe(schema: &mut SchemaBuilder<Self>) {
///         schema
///             .field("id", |t: &Tag| &t.id, |t: &mut Tag| &mut t.id)
///             .field("label", |t: &Tag| &t.label, |t: &mut Tag| &mut t.label);
///     }
/// }
///
/// impl Entity for Tag {
///     type Id = i64;
///
///     fn id(&self) -> &i64 {
///         &self.id
///     }
///
///     fn set_id(&mut self, id: i64) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Entity: Describe + Clone {
    /// Identifier type
    type Id: Identity;

    /// Current identifier
    fn id(&self) -> &Self::Id;

    /// Assign the identifier (used by stores on insert)
    fn set_id(&mut self, id: Self::Id);
}

/// Row range fetched for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Rows to skip
    pub skip: usize,
    /// Maximum rows to return
    pub take: usize,
}

impl Window {
    /// Create a window
    #[must_use]
    pub const fn new(skip: usize, take: usize) -> Self {
        Self { skip, take }
    }
}

/// One pending modification
#[derive(Debug, Clone)]
pub enum Change<T: Entity> {
    /// Add a new row; an unset identifier is generated by the store
    Insert(T),
    /// Replace an existing row with the same identifier
    Update(T),
    /// Remove the row with this identifier
    Remove(T::Id),
}

/// Ordered modifications applied by one [`Store::commit`]
///
/// A store applies either every change or none of them.
#[derive(Debug, Clone)]
pub struct ChangeSet<T: Entity> {
    changes: Vec<Change<T>>,
}

impl<T: Entity> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
        }
    }
}

impl<T: Entity> ChangeSet<T> {
    /// An empty change set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an insert
    pub fn insert(&mut self, entity: T) -> &mut Self {
        self.changes.push(Change::Insert(entity));
        self
    }

    /// Queue a full replacement
    pub fn update(&mut self, entity: T) -> &mut Self {
        self.changes.push(Change::Update(entity));
        self
    }

    /// Queue a removal
    pub fn remove(&mut self, id: T::Id) -> &mut Self {
        self.changes.push(Change::Remove(id));
        self
    }

    /// Number of queued changes
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Queued changes in order
    pub fn iter(&self) -> impl Iterator<Item = &Change<T>> {
        self.changes.iter()
    }
}

impl<T: Entity> IntoIterator for ChangeSet<T> {
    type Item = Change<T>;
    type IntoIter = std::vec::IntoIter<Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Backing store for one entity type
///
/// # Contract
///
/// - `count` and `fetch` honor every predicate, the soft-delete flag and the
///   ordering of the [`Query`]; `fetch` applies the window after ordering
/// - without an ordering, rows come back in the store's natural order
/// - `commit` applies the whole [`ChangeSet`] or nothing, and returns one row
///   per change in change order: the stored row for inserts and updates, the
///   removed row for removals
/// - a cancelled token yields a [`Cancelled`](super::RepositoryErrorKind::Cancelled)
///   error and, for `commit`, leaves the store untouched
pub trait Store<T: Entity>: Send + Sync {
    /// Count rows matching `query`
    fn count(
        &self,
        query: &Query<T>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Fetch rows matching `query`, optionally restricted to a window
    fn fetch(
        &self,
        query: &Query<T>,
        window: Option<Window>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;

    /// Apply a change set atomically
    fn commit(
        &self,
        changes: ChangeSet<T>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;
}
