//! Generic repository over pluggable stores
//!
//! # Features
//!
//! - **Generic CRUD**: [`GenericRepository`] for lookups, listing, inserts, updates and deletes
//! - **Dynamic listing**: filters and sorts built at runtime, see [`crate::query`]
//! - **Soft Delete**: flagged rows are hidden unless a query asks for them
//! - **Bulk updates**: [`FieldUpdate`] assignments applied as one unit of work
//! - **Relation Loading**: named includes resolved by the store
//! - **Pagination**: [`Page`] with navigation metadata
//!
//! Backends implement [`Store`]; [`MemoryStore`] is the in-process
//! implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_data::repository::{GenericRepository, ListOptions, MemoryStore};
//!
//! let repo = GenericRepository::new(MemoryStore::<User>::new(), config.repository.clone());
//! let user = repo.add(User::new("alice"), &cancel).await?;
//! let active = repo
//!     .get_list(
//!         ListOptions::new().filter(Predicate::new(|u: &User| u.active)),
//!         config.repository.first_page(),
//!         &cancel,
//!     )
//!     .await?;
//! ```

mod error;
mod generic;
mod memory;
mod page;
mod query;
mod traits;

// Re-export all public types
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use generic::{FieldUpdate, GenericRepository, ListOptions};
pub use memory::MemoryStore;
pub use page::{paginate, paginate_iter, IntoPage, Page, PageRequest};
pub use query::Query;
pub use traits::{Change, ChangeSet, Entity, Identity, RepositoryResult, Store, Window};
