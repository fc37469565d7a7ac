//! Errors raised while compiling filters, sorts and page requests

use thiserror::Error;

/// Failure to turn a query description into executable form
///
/// Every variant is raised before the backing store is touched and none of
/// them is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A filter, sort or update names a field the entity does not expose
    #[error("unknown field `{field}` on {entity}")]
    UnknownField {
        /// Entity type name
        entity: String,
        /// Requested field name
        field: String,
    },

    /// A filter uses an operator (or group logic) outside the supported set
    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),

    /// An operator or value does not fit the declared type of a field
    #[error("type mismatch on `{field}` (expected {expected}): {detail}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Declared type of the field
        expected: String,
        /// What went wrong
        detail: String,
    },

    /// A page request is out of range (`from > index` or `size == 0`)
    #[error("invalid page range: index {index}, size {size}, from {from}")]
    InvalidPageRange {
        /// Requested page index
        index: usize,
        /// Requested page size
        size: usize,
        /// Index of the first page
        from: usize,
    },
}

impl QueryError {
    /// Create an unknown field error
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl ToString,
        detail: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.to_string(),
            detail: detail.into(),
        }
    }
}
