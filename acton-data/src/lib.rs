//! # acton-data
//!
//! Dynamic queries and a generic repository for typed entities.
//!
//! ## Features
//!
//! - **Dynamic queries**: JSON-friendly filter trees and sort keys compiled into typed predicates and orderings
//! - **Field accessors**: per-type getters, setters and comparators built once and cached
//! - **Generic repository**: CRUD, partial and bulk updates, soft delete and restore over any [`repository::Store`]
//! - **Pagination**: count-then-window paging with navigation metadata
//! - **Configuration**: Figment layering of defaults, TOML files and `ACTON_` environment variables
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_data::prelude::*;
//!
//! #[derive(Clone)]
//! struct Task {
//!     id: i64,
//!     title: String,
//!     done: bool,
//! }
//!
//! impl Describe for Task {
//!     const NAME: &'static str = "Task";
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .field("id", |t: &Task| &t.id, |t: &mut Task| &mut t.id)
//!             .field("title", |t: &Task| &t.title, |t: &mut Task| &mut t.title)
//!             .field("done", |t: &Task| &t.done, |t: &mut Task| &mut t.done);
//!     }
//! }
//!
//! impl Entity for Task {
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
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let repo = GenericRepository::new(MemoryStore::<Task>::new(), config.repository.clone());
//!     let cancel = CancellationToken::new();
//!
//!     let query: DynamicQuery = serde_json::from_str(
//!         r#"{ "filter": { "field": "done", "operator": "eq", "value": false },
//!              "sort": [{ "field": "title", "dir": "asc" }] }"#,
//!     )?;
//!     let page = repo
//!         .get_list_by_dynamic(&query, ListOptions::new(), config.repository.first_page(), &cancel)
//!         .await?;
//!     info!(open = page.count, "Open tasks");
//!
//!     Ok(())
//! }
//! ```

pub mod accessor;
pub mod config;
pub mod error;
pub mod observability;
pub mod query;
pub mod repository;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::accessor::{accessors, Describe, FieldAccessor, Schema, SchemaBuilder};
    pub use crate::config::{Config, RepositoryConfig, ServiceConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;

    pub use crate::query::{
        compile_filter, compile_sorts, CompiledQuery, DynamicQuery, FieldValue, Filter,
        FilterLogic, FilterOperator, OrderBy, Predicate, QueryError, Sort, SortDirection,
    };

    pub use crate::repository::{
        paginate, Entity, FieldUpdate, GenericRepository, Identity, IntoPage, ListOptions,
        MemoryStore, Page, PageRequest, Query, RepositoryError, RepositoryErrorKind,
        RepositoryOperation, RepositoryResult, Store,
    };

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Re-export cancellation
    pub use tokio_util::sync::CancellationToken;

    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
