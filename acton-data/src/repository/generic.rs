//! Generic repository over any [`Store`]
//!
//! [`GenericRepository`] composes the query compilers, the pagination engine
//! and the cached field accessors into the usual repository surface: typed
//! and dynamic listing, lookups, inserts, full, partial and bulk updates,
//! physical and soft deletion.
//!
//! # Cancellation
//!
//! Every store-touching call takes a [`CancellationToken`]. Reads race the
//! token and fail with `Cancelled` as soon as it fires. Writes check the
//! token right before committing; a cancelled write changes nothing.
//!
//! # Example
//!
//! ```rust
//! use acton_data::accessor::{Describe, SchemaBuilder};
//! use acton_data::config::RepositoryConfig;
//! use acton_data::query::{DynamicQuery, Filter, Sort};
//! use acton_data::repository::{Entity, GenericRepository, ListOptions, MemoryStore};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Clone)]
//! struct Book {
//!     id: i64,
//!     title: String,
//!     year: i32,
//! }
//!
//! impl Describe for Book {
//!     const NAME: &'static str = "Book";
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .field("id", |b: &Book| &b.id, |b: &mut Book| &mut b.id)
//!             .field("title", |b: &Book| &b.title, |b: &mut Book| &mut b.title)
//!             .field("year", |b: &Book| &b.year, |b: &mut Book| &mut b.year);
//!     }
//! }
//!
//! impl Entity for Book {
//!     type Id = i64;
//!
//!     fn id(&self) -> &i64 {
//!         &self.id
//!     }
//!
//!     fn set_id(&mut self, id: i64) {
//!         self.id = id;
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let repo = GenericRepository::new(MemoryStore::new(), RepositoryConfig::default());
//! let cancel = CancellationToken::new();
//!
//! for (title, year) in [("Dune", 1965), ("Neuromancer", 1984), ("Hyperion", 1989)] {
//!     repo.add(Book { id: 0, title: title.into(), year }, &cancel).await.unwrap();
//! }
//!
//! let query = DynamicQuery::new()
//!     .with_filter(Filter::gte("year", 1980))
//!     .with_sort(Sort::desc("year"));
//! let page = repo
//!     .get_list_by_dynamic(&query, ListOptions::new(), repo.config().first_page(), &cancel)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(page.count, 2);
//! assert_eq!(page.items[0].title, "Hyperion");
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::accessor::{accessors, DELETED_BY, DELETED_DATE, IS_DELETED};
use crate::config::RepositoryConfig;
use crate::query::{DynamicQuery, FieldValue, OrderBy, Predicate, QueryError};

use super::error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use super::page::{paginate, Page, PageRequest};
use super::query::Query;
use super::traits::{ChangeSet, Entity, RepositoryResult, Store, Window};

/// Options shared by the listing and lookup operations
pub struct ListOptions<T> {
    /// Explicit filter, combined with AND with any dynamic filter
    pub predicate: Option<Predicate<T>>,
    /// Explicit ordering, used when no dynamic sort is given
    pub order_by: Option<OrderBy<T>>,
    /// Relations to load with each row
    pub includes: Vec<String>,
    /// Include soft-deleted rows
    pub with_deleted: bool,
    /// Ask the store for rows that will be written back; on by default
    pub tracked: bool,
}

impl<T> Default for ListOptions<T> {
    fn default() -> Self {
        Self {
            predicate: None,
            order_by: None,
            includes: Vec::new(),
            with_deleted: false,
            tracked: true,
        }
    }
}

impl<T> Clone for ListOptions<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            order_by: self.order_by.clone(),
            includes: self.includes.clone(),
            with_deleted: self.with_deleted,
            tracked: self.tracked,
        }
    }
}

impl<T> fmt::Debug for ListOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListOptions")
            .field("filtered", &self.predicate.is_some())
            .field("ordered", &self.order_by.is_some())
            .field("includes", &self.includes)
            .field("with_deleted", &self.with_deleted)
            .field("tracked", &self.tracked)
            .finish()
    }
}

impl<T: 'static> ListOptions<T> {
    /// No filter, natural order, soft-deleted rows hidden, tracked rows
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter; repeated calls combine with AND
    #[must_use]
    pub fn filter(mut self, predicate: Predicate<T>) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Set the ordering
    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy<T>) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Load a relation with each row
    #[must_use]
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.includes.push(relation.into());
        self
    }

    /// Include soft-deleted rows
    #[must_use]
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Request tracked or read-only rows
    #[must_use]
    pub fn tracked(mut self, tracked: bool) -> Self {
        self.tracked = tracked;
        self
    }
}

/// A value to assign to a named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Field name, resolved like filter fields
    pub field: String,
    /// New value, converted to the field's type when applied
    pub value: FieldValue,
}

impl FieldUpdate {
    /// Create a field update
    pub fn new(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

async fn race<R>(
    operation: RepositoryOperation,
    cancel: &CancellationToken,
    work: impl Future<Output = RepositoryResult<R>>,
) -> RepositoryResult<R> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RepositoryError::cancelled(operation)),
        result = work => result,
    }
}

fn compile_error(operation: RepositoryOperation) -> impl Fn(QueryError) -> RepositoryError {
    move |error| RepositoryError::from(error).with_operation(operation)
}

/// Repository for entity `T` backed by store `S`
pub struct GenericRepository<T: Entity, S: Store<T>> {
    store: S,
    config: RepositoryConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: Store<T> + fmt::Debug> fmt::Debug for GenericRepository<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericRepository")
            .field("entity", &T::NAME)
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Entity, S: Store<T>> GenericRepository<T, S> {
    /// Create a repository
    pub fn new(store: S, config: RepositoryConfig) -> Self {
        Self {
            store,
            config,
            _entity: PhantomData,
        }
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Repository defaults
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Deferred query; nothing is read until it is handed to the store
    pub fn query(&self, predicate: Option<Predicate<T>>, order_by: Option<OrderBy<T>>) -> Query<T> {
        let mut query = Query::new();
        if let Some(predicate) = predicate {
            query = query.filter(predicate);
        }
        if let Some(order_by) = order_by {
            query = query.order_by(order_by);
        }
        query
    }

    fn build_query(&self, options: ListOptions<T>) -> Query<T> {
        let ListOptions {
            predicate,
            order_by,
            includes,
            with_deleted,
            tracked,
        } = options;
        includes.into_iter().fold(
            self.query(predicate, order_by)
                .with_deleted(with_deleted)
                .tracked(tracked),
            |query, relation| query.include(relation),
        )
    }

    fn by_id(id: &T::Id) -> Predicate<T> {
        let id = id.clone();
        Predicate::new(move |item: &T| item.id() == &id)
    }

    async fn commit(
        &self,
        operation: RepositoryOperation,
        changes: ChangeSet<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(RepositoryError::cancelled(operation));
        }
        self.store
            .commit(changes, cancel)
            .await
            .map_err(|e| e.with_operation(operation))
    }

    async fn commit_one(
        &self,
        operation: RepositoryOperation,
        changes: ChangeSet<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<T> {
        self.commit(operation, changes, cancel)
            .await?
            .pop()
            .ok_or_else(|| {
                RepositoryError::store_error(operation, "Store returned no row for the change")
                    .with_entity_type(T::NAME)
            })
    }

    /// First row matching the options, if any
    pub async fn get_one(
        &self,
        options: ListOptions<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<T>> {
        let query = self.build_query(options);
        let rows = race(
            RepositoryOperation::FindOne,
            cancel,
            self.store.fetch(&query, Some(Window::new(0, 1)), cancel),
        )
        .await?;
        tracing::debug!(entity = T::NAME, found = !rows.is_empty(), "get_one");
        Ok(rows.into_iter().next())
    }

    /// First row matching the options
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches.
    pub async fn require_one(
        &self,
        options: ListOptions<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<T> {
        self.get_one(options, cancel).await?.ok_or_else(|| {
            RepositoryError::new(
                RepositoryOperation::FindOne,
                RepositoryErrorKind::NotFound,
                "No entity matches the predicate",
            )
            .with_entity_type(T::NAME)
        })
    }

    /// One page of rows matching the options
    pub async fn get_list(
        &self,
        options: ListOptions<T>,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Page<T>> {
        let query = self.build_query(options);
        race(
            RepositoryOperation::FindAll,
            cancel,
            paginate(&self.store, &query, request, cancel),
        )
        .await
    }

    /// One page of rows matching a dynamic query and the options
    ///
    /// The dynamic filter is combined with the explicit predicate using AND.
    /// Dynamic sort keys replace the explicit ordering; the explicit ordering
    /// applies only when the dynamic query has none.
    ///
    /// # Errors
    ///
    /// `UnknownField`, `UnsupportedOperator` or `TypeMismatch` when the
    /// dynamic query does not compile; the store is not touched then.
    pub async fn get_list_by_dynamic(
        &self,
        dynamic: &DynamicQuery,
        mut options: ListOptions<T>,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Page<T>> {
        let compiled = dynamic
            .compile::<T>()
            .map_err(compile_error(RepositoryOperation::FindAll))?;

        if let Some(predicate) = compiled.predicate {
            options = options.filter(predicate);
        }
        if let Some(order_by) = compiled.order_by {
            options.order_by = Some(order_by);
        }

        tracing::debug!(
            entity = T::NAME,
            filtered = dynamic.filter.is_some(),
            sort_keys = dynamic.sort.len(),
            index = request.index,
            size = request.size,
            "get_list_by_dynamic"
        );
        self.get_list(options, request, cancel).await
    }

    /// Row with the given identifier
    ///
    /// # Errors
    ///
    /// `NotFound` when no visible row has this identifier.
    pub async fn get_by_id(&self, id: &T::Id, cancel: &CancellationToken) -> RepositoryResult<T> {
        let options = ListOptions::new().filter(Self::by_id(id));
        self.get_one(options, cancel)
            .await
            .map_err(|e| e.with_operation(RepositoryOperation::FindById))?
            .ok_or_else(|| RepositoryError::not_found(T::NAME, id.to_string()))
    }

    /// Number of visible rows matching `predicate`
    pub async fn count(
        &self,
        predicate: Option<Predicate<T>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        let query = self.query(predicate, None);
        race(
            RepositoryOperation::Count,
            cancel,
            self.store.count(&query, cancel),
        )
        .await
    }

    /// Whether any visible row matches `predicate`
    pub async fn any(
        &self,
        predicate: Option<Predicate<T>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        let query = self.query(predicate, None);
        let rows = race(
            RepositoryOperation::Exists,
            cancel,
            self.store.fetch(&query, Some(Window::new(0, 1)), cancel),
        )
        .await?;
        Ok(!rows.is_empty())
    }

    /// Insert one entity; an unset identifier is generated by the store
    pub async fn add(&self, entity: T, cancel: &CancellationToken) -> RepositoryResult<T> {
        let mut changes = ChangeSet::new();
        changes.insert(entity);
        let added = self
            .commit_one(RepositoryOperation::Create, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, id = %added.id(), "Entity added");
        Ok(added)
    }

    /// Insert several entities in one unit of work
    pub async fn add_range(
        &self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        let mut changes = ChangeSet::new();
        for entity in entities {
            changes.insert(entity);
        }
        let added = self
            .commit(RepositoryOperation::Create, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, count = added.len(), "Entities added");
        Ok(added)
    }

    /// Replace the stored row with `entity`
    ///
    /// # Errors
    ///
    /// `NotFound` when no row has the entity's identifier.
    pub async fn update(&self, entity: T, cancel: &CancellationToken) -> RepositoryResult<T> {
        let mut changes = ChangeSet::new();
        changes.update(entity);
        let updated = self
            .commit_one(RepositoryOperation::Update, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, id = %updated.id(), "Entity updated");
        Ok(updated)
    }

    /// Replace several rows in one unit of work
    ///
    /// A missing row rejects the whole call.
    pub async fn update_range(
        &self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        let mut changes = ChangeSet::new();
        for entity in entities {
            changes.update(entity);
        }
        let updated = self
            .commit(RepositoryOperation::Update, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, count = updated.len(), "Entities updated");
        Ok(updated)
    }

    /// Copy only the named fields of `entity` onto the stored row
    ///
    /// Field names resolve like filter fields. The stored row is found by
    /// identifier, soft-deleted or not.
    ///
    /// # Errors
    ///
    /// `UnknownField` before touching the store, `NotFound` when the row
    /// does not exist.
    pub async fn update_partial(
        &self,
        entity: &T,
        fields: &[&str],
        cancel: &CancellationToken,
    ) -> RepositoryResult<T> {
        let schema = accessors::<T>();
        let accessors = schema
            .require(fields)
            .map_err(compile_error(RepositoryOperation::Update))?;

        let options = ListOptions::new()
            .filter(Self::by_id(entity.id()))
            .with_deleted()
            .tracked(true);
        let mut stored = self
            .get_one(options, cancel)
            .await
            .map_err(|e| e.with_operation(RepositoryOperation::Update))?
            .ok_or_else(|| {
                RepositoryError::not_found(T::NAME, entity.id().to_string())
                    .with_operation(RepositoryOperation::Update)
            })?;

        for accessor in &accessors {
            accessor.copy(entity, &mut stored);
        }

        let mut changes = ChangeSet::new();
        changes.update(stored);
        let updated = self
            .commit_one(RepositoryOperation::Update, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, id = %updated.id(), ?fields, "Entity partially updated");
        Ok(updated)
    }

    /// Assign field values on every visible row matching `predicate`
    ///
    /// All matches are loaded, updated in memory and committed as one unit
    /// of work. A value that does not convert to its field's type, or a store
    /// rejection, leaves every row unchanged.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let renamed = repo
    ///     .bulk_update(
    ///         compile_filter::<User>(&Filter::starts_with("name", "tmp_"))?,
    ///         &[FieldUpdate::new("active", false)],
    ///         &cancel,
    ///     )
    ///     .await?;
    /// ```
    pub async fn bulk_update(
        &self,
        predicate: Predicate<T>,
        updates: &[FieldUpdate],
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        let schema = accessors::<T>();
        let targets = updates
            .iter()
            .map(|update| schema.field(&update.field).map(|accessor| (accessor, &update.value)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(compile_error(RepositoryOperation::BulkUpdate))?;

        let query = self.query(Some(predicate), None).tracked(true);
        let rows = race(
            RepositoryOperation::BulkUpdate,
            cancel,
            self.store.fetch(&query, None, cancel),
        )
        .await?;

        let mut changes = ChangeSet::new();
        for mut row in rows {
            for (accessor, value) in &targets {
                accessor
                    .set(&mut row, (*value).clone())
                    .map_err(compile_error(RepositoryOperation::BulkUpdate))?;
            }
            changes.update(row);
        }

        let updated = self
            .commit(RepositoryOperation::BulkUpdate, changes, cancel)
            .await?;
        tracing::info!(
            entity = T::NAME,
            count = updated.len(),
            fields = updates.len(),
            "Bulk update applied"
        );
        Ok(updated)
    }

    /// Physically remove the row of `entity`
    pub async fn delete(&self, entity: &T, cancel: &CancellationToken) -> RepositoryResult<T> {
        self.delete_by_id(entity.id(), cancel).await
    }

    /// Physically remove the row with this identifier
    ///
    /// # Errors
    ///
    /// `NotFound` when no row has this identifier.
    pub async fn delete_by_id(&self, id: &T::Id, cancel: &CancellationToken) -> RepositoryResult<T> {
        let mut changes = ChangeSet::new();
        changes.remove(id.clone());
        let removed = self
            .commit_one(RepositoryOperation::Delete, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, id = %id, "Entity deleted");
        Ok(removed)
    }

    /// Physically remove every visible row matching `predicate`
    pub async fn delete_where(
        &self,
        predicate: Predicate<T>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        let query = self.query(Some(predicate), None);
        let rows = race(
            RepositoryOperation::Delete,
            cancel,
            self.store.fetch(&query, None, cancel),
        )
        .await?;

        let mut changes = ChangeSet::new();
        for row in &rows {
            changes.remove(row.id().clone());
        }
        let removed = self
            .commit(RepositoryOperation::Delete, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, count = removed.len(), "Entities deleted");
        Ok(removed)
    }

    /// Mark `entity` as deleted and store it
    ///
    /// Sets `is_deleted`, `deleted_date` (now, UTC) and `deleted_by` (the
    /// given actor or the configured default), skipping the latter two when
    /// the entity does not register them.
    ///
    /// # Errors
    ///
    /// `UnknownField` when the entity has no `is_deleted` field, `NotFound`
    /// when its row does not exist.
    pub async fn soft_delete(
        &self,
        entity: T,
        deleted_by: Option<&str>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<T> {
        let mut changes = ChangeSet::new();
        changes.update(self.mark_deleted(entity, deleted_by)?);
        let deleted = self
            .commit_one(RepositoryOperation::SoftDelete, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, id = %deleted.id(), "Entity soft-deleted");
        Ok(deleted)
    }

    /// Soft delete several entities in one unit of work
    pub async fn soft_delete_range(
        &self,
        entities: Vec<T>,
        deleted_by: Option<&str>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>> {
        let mut changes = ChangeSet::new();
        for entity in entities {
            changes.update(self.mark_deleted(entity, deleted_by)?);
        }
        let deleted = self
            .commit(RepositoryOperation::SoftDelete, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, count = deleted.len(), "Entities soft-deleted");
        Ok(deleted)
    }

    /// Clear the soft-delete marks of `entity` and store it
    pub async fn restore(&self, entity: T, cancel: &CancellationToken) -> RepositoryResult<T> {
        let mut restored = entity;
        self.set_soft_delete_fields(
            &mut restored,
            RepositoryOperation::Restore,
            FieldValue::Boolean(false),
            FieldValue::Null,
            FieldValue::Null,
        )?;

        let mut changes = ChangeSet::new();
        changes.update(restored);
        let restored = self
            .commit_one(RepositoryOperation::Restore, changes, cancel)
            .await?;
        tracing::info!(entity = T::NAME, id = %restored.id(), "Entity restored");
        Ok(restored)
    }

    fn mark_deleted(&self, mut entity: T, deleted_by: Option<&str>) -> RepositoryResult<T> {
        let actor = deleted_by.unwrap_or(&self.config.default_actor);
        self.set_soft_delete_fields(
            &mut entity,
            RepositoryOperation::SoftDelete,
            FieldValue::Boolean(true),
            FieldValue::DateTime(Utc::now()),
            FieldValue::from(actor),
        )?;
        Ok(entity)
    }

    fn set_soft_delete_fields(
        &self,
        entity: &mut T,
        operation: RepositoryOperation,
        flag: FieldValue,
        date: FieldValue,
        actor: FieldValue,
    ) -> RepositoryResult<()> {
        let schema = accessors::<T>();
        let to_error = compile_error(operation);

        schema.field(IS_DELETED).map_err(&to_error)?.set(entity, flag).map_err(&to_error)?;
        if let Ok(field) = schema.field(DELETED_DATE) {
            field.set(entity, date).map_err(&to_error)?;
        }
        if let Ok(field) = schema.field(DELETED_BY) {
            field.set(entity, actor).map_err(&to_error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{compile_filter, Filter, Sort};
    use crate::repository::MemoryStore;
    use crate::testing::{people, Person};

    type Repo = GenericRepository<Person, MemoryStore<Person>>;

    async fn seeded() -> Repo {
        let repo = GenericRepository::new(MemoryStore::new(), RepositoryConfig::default());
        repo.add_range(people(), &CancellationToken::new()).await.unwrap();
        repo
    }

    fn names(rows: &[Person]) -> Vec<&str> {
        rows.iter().map(|p| p.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_dynamic_filter_selects_bob() {
        let repo = seeded().await;
        let dynamic: DynamicQuery = serde_json::from_value(serde_json::json!({
            "filter": { "field": "Name", "operator": "eq", "value": "Bob" }
        }))
        .unwrap();

        let page = repo
            .get_list_by_dynamic(
                &dynamic,
                ListOptions::new(),
                PageRequest::first(10),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(names(&page.items), vec!["Bob"]);
    }

    #[tokio::test]
    async fn test_dynamic_sort_wins_over_explicit_order() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();
        let options = ListOptions::new().order_by(OrderBy::asc(|p: &Person| p.age));

        let dynamic = DynamicQuery::new().with_sort(Sort::desc("name"));
        let page = repo
            .get_list_by_dynamic(&dynamic, options.clone(), PageRequest::first(10), &cancel)
            .await
            .unwrap();
        assert_eq!(names(&page.items), vec!["Charlie", "Bob", "Alice"]);

        let fallback = repo
            .get_list_by_dynamic(&DynamicQuery::new(), options, PageRequest::first(10), &cancel)
            .await
            .unwrap();
        assert_eq!(names(&fallback.items), vec!["Bob", "Alice", "Charlie"]);
    }

    #[tokio::test]
    async fn test_dynamic_filter_and_explicit_predicate_combine() {
        let repo = seeded().await;
        let dynamic = DynamicQuery::new().with_filter(Filter::gte("age", 28));
        let options = ListOptions::new().filter(Predicate::new(|p: &Person| p.email.is_some()));
        let page = repo
            .get_list_by_dynamic(&dynamic, options, PageRequest::first(10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(names(&page.items), vec!["Alice"]);
    }

    #[tokio::test]
    async fn test_bad_dynamic_query_is_reported() {
        let repo = seeded().await;
        let dynamic = DynamicQuery::new().with_filter(Filter::eq("nickname", "x"));
        let err = repo
            .get_list_by_dynamic(
                &dynamic,
                ListOptions::new(),
                PageRequest::first(10),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::UnknownField);
        assert_eq!(err.operation, RepositoryOperation::FindAll);
    }

    #[tokio::test]
    async fn test_lookups_and_not_found() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();

        assert_eq!(repo.get_by_id(&2, &cancel).await.unwrap().name, "Bob");
        let err = repo.get_by_id(&99, &cancel).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.entity_id.as_deref(), Some("99"));

        let old = ListOptions::new().filter(Predicate::new(|p: &Person| p.age > 40));
        assert_eq!(repo.get_one(old, &cancel).await.unwrap().unwrap().name, "Charlie");

        let none = ListOptions::new().filter(Predicate::new(|p: &Person| p.age > 90));
        assert!(repo.get_one(none.clone(), &cancel).await.unwrap().is_none());
        assert!(repo.require_one(none, &cancel).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_count_and_any() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();
        let has_email = Predicate::new(|p: &Person| p.email.is_some());

        assert_eq!(repo.count(None, &cancel).await.unwrap(), 3);
        assert_eq!(repo.count(Some(has_email.clone()), &cancel).await.unwrap(), 2);
        assert!(repo.any(Some(has_email.not()), &cancel).await.unwrap());
        assert!(!repo
            .any(Some(Predicate::new(|p: &Person| p.age < 0)), &cancel)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_soft_delete_round_trip() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();
        let bob = repo.get_by_id(&2, &cancel).await.unwrap();

        let deleted = repo.soft_delete(bob, None, &cancel).await.unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.deleted_date.is_some());
        assert_eq!(deleted.deleted_by.as_deref(), Some("system"));

        assert!(repo.get_by_id(&2, &cancel).await.unwrap_err().is_not_found());
        assert_eq!(repo.count(None, &cancel).await.unwrap(), 2);

        let all = repo
            .get_list(ListOptions::new().with_deleted(), PageRequest::first(10), &cancel)
            .await
            .unwrap();
        assert_eq!(all.count, 3);
        let listed = all.items.iter().find(|p| p.id == 2).unwrap();
        assert!(listed.is_deleted);
        assert!(listed.deleted_date.is_some());
        assert_eq!(listed.deleted_by.as_deref(), Some("system"));

        let restored = repo.restore(deleted, &cancel).await.unwrap();
        assert!(!restored.is_deleted);
        assert!(restored.deleted_date.is_none());
        assert!(restored.deleted_by.is_none());
        assert_eq!(repo.get_by_id(&2, &cancel).await.unwrap().name, "Bob");
    }

    #[derive(Debug, Clone, Default)]
    struct Invoice {
        id: i64,
        number: String,
        flagged: bool,
        removed_at: Option<chrono::DateTime<Utc>>,
        removed_by: Option<String>,
    }

    impl crate::accessor::Describe for Invoice {
        const NAME: &'static str = "Invoice";

        fn describe(schema: &mut crate::accessor::SchemaBuilder<Self>) {
            schema
                .field("Id", |i: &Invoice| &i.id, |i: &mut Invoice| &mut i.id)
                .field("Number", |i: &Invoice| &i.number, |i: &mut Invoice| &mut i.number)
                .field("IsDeleted", |i: &Invoice| &i.flagged, |i: &mut Invoice| &mut i.flagged)
                .field(
                    "DeletedDate",
                    |i: &Invoice| &i.removed_at,
                    |i: &mut Invoice| &mut i.removed_at,
                )
                .field(
                    "DeletedBy",
                    |i: &Invoice| &i.removed_by,
                    |i: &mut Invoice| &mut i.removed_by,
                );
        }
    }

    impl Entity for Invoice {
        type Id = i64;

        fn id(&self) -> &i64 {
            &self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    #[tokio::test]
    async fn test_soft_delete_hides_rows_with_pascal_case_flag() {
        let repo = GenericRepository::new(MemoryStore::new(), RepositoryConfig::default());
        let cancel = CancellationToken::new();
        let invoice = repo
            .add(
                Invoice {
                    number: "INV-1".to_string(),
                    ..Invoice::default()
                },
                &cancel,
            )
            .await
            .unwrap();

        let deleted = repo.soft_delete(invoice, Some("clerk"), &cancel).await.unwrap();
        assert!(deleted.flagged);
        assert!(deleted.removed_at.is_some());
        assert_eq!(deleted.removed_by.as_deref(), Some("clerk"));

        let visible = repo
            .get_list(ListOptions::new(), PageRequest::first(10), &cancel)
            .await
            .unwrap();
        assert_eq!(visible.count, 0);
        assert!(repo.get_by_id(&deleted.id, &cancel).await.unwrap_err().is_not_found());

        let all = repo
            .get_list(ListOptions::new().with_deleted(), PageRequest::first(10), &cancel)
            .await
            .unwrap();
        assert_eq!(all.count, 1);
        assert!(all.items[0].flagged);
    }

    #[test]
    fn test_list_options_track_by_default() {
        let repo: Repo = GenericRepository::new(MemoryStore::new(), RepositoryConfig::default());
        assert!(ListOptions::<Person>::new().tracked);
        assert!(repo.build_query(ListOptions::new()).is_tracked());
        assert!(!repo
            .build_query(ListOptions::new().tracked(false))
            .is_tracked());
    }

    #[tokio::test]
    async fn test_soft_delete_range_records_actor() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();
        let everyone = repo
            .get_list(ListOptions::new(), PageRequest::first(10), &cancel)
            .await
            .unwrap()
            .items;

        let deleted = repo
            .soft_delete_range(everyone, Some("auditor"), &cancel)
            .await
            .unwrap();
        assert_eq!(deleted.len(), 3);
        assert!(deleted.iter().all(|p| p.deleted_by.as_deref() == Some("auditor")));
        assert!(!repo.any(None, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_update_only_touches_matches() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();
        repo.add_range(
            vec![Person::new("Bulk1", 1), Person::new("Bulk2", 2)],
            &cancel,
        )
        .await
        .unwrap();

        let predicate = compile_filter::<Person>(&Filter::starts_with("Name", "Bulk")).unwrap();
        let updated = repo
            .bulk_update(predicate, &[FieldUpdate::new("Name", "UpdatedBulk")], &cancel)
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);

        let rows = repo.store().snapshot().await;
        assert_eq!(rows.iter().filter(|p| p.name == "UpdatedBulk").count(), 2);
        assert_eq!(names(&rows[..3]), vec!["Alice", "Bob", "Charlie"]);
    }

    #[tokio::test]
    async fn test_bulk_update_is_all_or_nothing() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();
        let before = repo.store().snapshot().await;

        let err = repo
            .bulk_update(
                Predicate::always(),
                &[
                    FieldUpdate::new("name", "Renamed"),
                    FieldUpdate::new("age", "forty"),
                ],
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::TypeMismatch);
        assert_eq!(repo.store().snapshot().await, before);

        let err = repo
            .bulk_update(Predicate::always(), &[FieldUpdate::new("height", 180)], &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::UnknownField);
    }

    #[tokio::test]
    async fn test_update_partial_copies_named_fields_only() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();

        let mut edited = repo.get_by_id(&1, &cancel).await.unwrap();
        edited.name = "Alicia".to_string();
        edited.age = 99;

        let updated = repo.update_partial(&edited, &["Name"], &cancel).await.unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.age, 30);

        let err = repo
            .update_partial(&edited, &["shoe_size"], &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::UnknownField);
    }

    #[tokio::test]
    async fn test_update_and_update_range() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();

        let mut bob = repo.get_by_id(&2, &cancel).await.unwrap();
        bob.age = 26;
        assert_eq!(repo.update(bob.clone(), &cancel).await.unwrap().age, 26);

        let mut ghost = Person::new("Ghost", 1);
        ghost.id = 77;
        bob.age = 27;
        let err = repo.update_range(vec![bob, ghost], &cancel).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.operation, RepositoryOperation::Update);
        assert_eq!(repo.get_by_id(&2, &cancel).await.unwrap().age, 26);
    }

    #[tokio::test]
    async fn test_delete_variants() {
        let repo = seeded().await;
        let cancel = CancellationToken::new();

        let alice = repo.get_by_id(&1, &cancel).await.unwrap();
        assert_eq!(repo.delete(&alice, &cancel).await.unwrap().name, "Alice");
        assert!(repo.delete_by_id(&1, &cancel).await.unwrap_err().is_not_found());

        let removed = repo
            .delete_where(Predicate::new(|p: &Person| p.age > 20), &cancel)
            .await
            .unwrap();
        assert_eq!(names(&removed), vec!["Bob", "Charlie"]);
        assert!(repo.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_cancelled_calls_change_nothing() {
        let repo = seeded().await;
        let before = repo.store().snapshot().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = repo.add(Person::new("Late", 1), &cancel).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Cancelled);
        assert_eq!(err.operation, RepositoryOperation::Create);

        let err = repo
            .bulk_update(Predicate::always(), &[FieldUpdate::new("age", 1)], &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Cancelled);

        let err = repo.count(None, &cancel).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Cancelled);

        assert_eq!(repo.store().snapshot().await, before);
    }

    #[tokio::test]
    async fn test_get_list_pages_with_configured_base() {
        let config = RepositoryConfig {
            default_page_size: 2,
            page_base: 1,
            ..RepositoryConfig::default()
        };
        let repo = GenericRepository::new(MemoryStore::new(), config);
        let cancel = CancellationToken::new();
        repo.add_range(people(), &cancel).await.unwrap();

        let request = repo.config().page_request(2, None);
        let page = repo
            .get_list(
                ListOptions::new().order_by(OrderBy::asc(|p: &Person| p.age)),
                request,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(names(&page.items), vec!["Charlie"]);
        assert!(page.is_last_page());
        assert!(page.has_previous);
    }
}
