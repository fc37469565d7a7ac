//! In-memory [`Store`] implementation
//!
//! Rows live in a `BTreeMap` keyed by identifier behind a tokio `RwLock`, so
//! the natural order is ascending identifier. A commit stages every change
//! on a copy of the map and swaps it in only when all changes succeeded.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = MemoryStore::<User>::new()
//!     .with_include("roles", |user: &mut User| user.roles = load_roles(user.id));
//! store.seed(fixtures()).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use super::error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use super::query::Query;
use super::traits::{Change, ChangeSet, Entity, Identity, RepositoryResult, Store, Window};

type Loader<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Thread-safe in-memory store
pub struct MemoryStore<T: Entity> {
    rows: RwLock<BTreeMap<T::Id, T>>,
    sequence: AtomicU64,
    loaders: HashMap<String, Loader<T>>,
}

impl<T: Entity> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entity", &T::NAME)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .field("relations", &self.loaders.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<T: Entity> MemoryStore<T> {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            sequence: AtomicU64::new(0),
            loaders: HashMap::new(),
        }
    }

    /// Register a loader run on every fetched row when `relation` is included
    #[must_use]
    pub fn with_include(
        mut self,
        relation: impl Into<String>,
        loader: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        self.loaders.insert(relation.into(), Arc::new(loader));
        self
    }

    /// Insert rows outside of any repository call
    pub async fn seed(&self, rows: impl IntoIterator<Item = T>) -> RepositoryResult<Vec<T>> {
        let mut changes = ChangeSet::new();
        for row in rows {
            changes.insert(row);
        }
        self.commit(changes, &CancellationToken::new()).await
    }

    /// Every stored row, soft-deleted ones included, in identifier order
    pub async fn snapshot(&self) -> Vec<T> {
        self.rows.read().await.values().cloned().collect()
    }

    /// Number of stored rows, soft-deleted ones included
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store holds no rows
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn read(
        &self,
        operation: RepositoryOperation,
        cancel: &CancellationToken,
    ) -> RepositoryResult<RwLockReadGuard<'_, BTreeMap<T::Id, T>>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RepositoryError::cancelled(operation)),
            guard = self.rows.read() => Ok(guard),
        }
    }

    async fn write(
        &self,
        cancel: &CancellationToken,
    ) -> RepositoryResult<RwLockWriteGuard<'_, BTreeMap<T::Id, T>>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RepositoryError::cancelled(RepositoryOperation::Update)),
            guard = self.rows.write() => Ok(guard),
        }
    }

    fn next_id(&self, rows: &BTreeMap<T::Id, T>) -> RepositoryResult<T::Id> {
        loop {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let id = T::Id::generate(sequence).ok_or_else(|| {
                RepositoryError::store_error(
                    RepositoryOperation::Create,
                    "identifier sequence exhausted",
                )
                .with_entity(T::NAME, sequence.to_string())
            })?;
            if !rows.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn load_relations(&self, query: &Query<T>, rows: &mut [T]) -> RepositoryResult<()> {
        for relation in query.includes() {
            let loader = self.loaders.get(relation).ok_or_else(|| {
                RepositoryError::new(
                    RepositoryOperation::FindAll,
                    RepositoryErrorKind::UnknownField,
                    format!("unknown relation `{}`", relation),
                )
                .with_entity(T::NAME, relation.clone())
            })?;
            rows.iter_mut().for_each(|row| loader(row));
        }
        Ok(())
    }

    fn stage(&self, rows: &mut BTreeMap<T::Id, T>, change: Change<T>) -> RepositoryResult<T> {
        match change {
            Change::Insert(mut entity) => {
                if entity.id().is_unset() {
                    entity.set_id(self.next_id(rows)?);
                } else if rows.contains_key(entity.id()) {
                    return Err(RepositoryError::already_exists(
                        T::NAME,
                        entity.id().to_string(),
                    ));
                }
                rows.insert(entity.id().clone(), entity.clone());
                Ok(entity)
            }
            Change::Update(entity) => match rows.get_mut(entity.id()) {
                Some(slot) => {
                    *slot = entity.clone();
                    Ok(entity)
                }
                None => Err(RepositoryError::not_found(T::NAME, entity.id().to_string())
                    .with_operation(RepositoryOperation::Update)),
            },
            Change::Remove(id) => rows.remove(&id).ok_or_else(|| {
                RepositoryError::not_found(T::NAME, id.to_string())
                    .with_operation(RepositoryOperation::Delete)
            }),
        }
    }
}

impl<T: Entity> Store<T> for MemoryStore<T> {
    async fn count(&self, query: &Query<T>, cancel: &CancellationToken) -> RepositoryResult<u64> {
        let rows = self.read(RepositoryOperation::Count, cancel).await?;
        Ok(rows.values().filter(|row| query.matches(row)).count() as u64)
    }

    async fn fetch(
        &self,
        query: &Query<T>,
        window: Option<Window>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        let mut selected: Vec<T> = {
            let rows = self.read(RepositoryOperation::FindAll, cancel).await?;
            rows.values().filter(|row| query.matches(row)).cloned().collect()
        };

        if let Some(order_by) = query.ordering() {
            order_by.sort(&mut selected);
        }
        if let Some(window) = window {
            selected = selected
                .into_iter()
                .skip(window.skip)
                .take(window.take)
                .collect();
        }

        self.load_relations(query, &mut selected)?;
        Ok(selected)
    }

    async fn commit(
        &self,
        changes: ChangeSet<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        let mut rows = self.write(cancel).await?;

        let mut staged = rows.clone();
        let mut results = Vec::with_capacity(changes.len());
        for change in changes {
            results.push(self.stage(&mut staged, change)?);
        }

        if cancel.is_cancelled() {
            return Err(RepositoryError::cancelled(RepositoryOperation::Update));
        }
        *rows = staged;
        Ok(results)
    }
}
