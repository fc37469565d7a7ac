//! Dynamic filter and sort descriptions and their compilers
//!
//! - [`Filter`], [`Sort`] and [`DynamicQuery`]: plain serde data describing
//!   what to select and in which order
//! - [`compile_filter`]: filter tree to [`Predicate`]
//! - [`compile_sorts`]: sort keys to [`OrderBy`]
//! - [`FieldValue`] / [`FieldKind`]: typed values behind field accessors
//!
//! # Example
//!
//! ```rust
//! use acton_data::accessor::{Describe, SchemaBuilder};
//! use acton_data::query::{DynamicQuery, Filter, Sort};
//!
//! struct Task {
//!     title: String,
//!     done: bool,
//! }
//!
//! impl Describe for Task {
//!     const NAME: &'static str = "Task";
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .field("title", |t: &Task| &t.title, |t: &mut Task| &mut t.title)
//!             .field("done", |t: &Task| &t.done, |t: &mut Task| &mut t.done);
//!     }
//! }
//!
//! let compiled = DynamicQuery::new()
//!     .with_filter(Filter::eq("done", false))
//!     .with_sort(Sort::asc("title"))
//!     .compile::<Task>()
//!     .unwrap();
//!
//! let mut open = vec![
//!     Task { title: "write".into(), done: false },
//!     Task { title: "plan".into(), done: false },
//!     Task { title: "ship".into(), done: true },
//! ];
//! open.retain(|t| compiled.matches(t));
//! compiled.order_by.as_ref().unwrap().sort(&mut open);
//! assert_eq!(open[0].title, "plan");
//! ```

mod error;
mod model;
mod order;
mod predicate;
mod value;

pub use error::QueryError;
pub use model::{DynamicQuery, Filter, FilterLogic, FilterOperator, Sort, SortDirection};
pub use order::{compile_sorts, OrderBy};
pub use predicate::{compile_filter, Predicate};
pub use value::{FieldKind, FieldType, FieldValue, ValueKind};

pub(crate) use predicate::typed_comparison;

use crate::accessor::Describe;

/// A [`DynamicQuery`] compiled against one entity type
#[derive(Debug, Clone)]
pub struct CompiledQuery<T> {
    /// Compiled root filter, if any
    pub predicate: Option<Predicate<T>>,
    /// Compiled ordering, if any sort keys were given
    pub order_by: Option<OrderBy<T>>,
}

impl<T: 'static> CompiledQuery<T> {
    /// Whether `item` passes the filter; no filter accepts everything
    pub fn matches(&self, item: &T) -> bool {
        self.predicate.as_ref().map_or(true, |p| p.evaluate(item))
    }
}

impl DynamicQuery {
    /// Compile the filter and the sort keys against `T`
    ///
    /// # Errors
    ///
    /// Any [`QueryError`] raised by [`compile_filter`] or [`compile_sorts`].
    pub fn compile<T: Describe>(&self) -> Result<CompiledQuery<T>, QueryError> {
        let predicate = self.filter.as_ref().map(compile_filter::<T>).transpose()?;
        let order_by = compile_sorts::<T>(&self.sort)?;
        Ok(CompiledQuery {
            predicate,
            order_by,
        })
    }
}
