//! Cached typed field accessors
//!
//! Rust has no runtime reflection, so entities describe their fields once
//! through [`Describe::describe`]. The description is compiled into a
//! [`Schema`]: per field a getter, a setter, a native comparator and a
//! predicate factory, all closed over the concrete field type. Schemas are
//! built lazily on first use and kept for the lifetime of the process.
//!
//! # Example
//!
//! ```rust
//! use acton_data::accessor::{accessors, Describe, SchemaBuilder};
//! use acton_data::query::FieldValue;
//!
//! #[derive(Clone)]
//! struct Product {
//!     name: String,
//!     price: f64,
//! }
//!
//! impl Describe for Product {
//!     const NAME: &'static str = "Product";
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .field("name", |p: &Product| &p.name, |p: &mut Product| &mut p.name)
//!             .field("price", |p: &Product| &p.price, |p: &mut Product| &mut p.price);
//!     }
//! }
//!
//! let schema = accessors::<Product>();
//! let mut product = Product { name: "Lamp".into(), price: 20.0 };
//!
//! let price = schema.field("Price").unwrap();
//! price.set(&mut product, FieldValue::Float(25.0)).unwrap();
//! assert_eq!(price.get(&product), FieldValue::Float(25.0));
//! ```

mod cache;
mod schema;

pub use cache::{accessors, cached_types};
pub use schema::{Describe, FieldAccessor, Schema, SchemaBuilder};

/// Soft-delete flag field
pub const IS_DELETED: &str = "is_deleted";

/// Soft-delete timestamp field
pub const DELETED_DATE: &str = "deleted_date";

/// Soft-delete actor field
pub const DELETED_BY: &str = "deleted_by";
