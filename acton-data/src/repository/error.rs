//! Repository error types
//!
//! Structured errors carrying the failed operation, a category and, where
//! known, the entity involved. Query compilation failures convert into this
//! type so that every repository call has a single error type.
//!
//! # Example
//!
//! ```rust
//! use acton_data::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("User", "42");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.entity_id.is_some());
//! ```

use std::fmt;

use crate::query::QueryError;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Compiling a filter, sort or page request
    Compile,
    /// Finding a single entity by predicate
    FindOne,
    /// Finding a single entity by ID
    FindById,
    /// Listing entities
    FindAll,
    /// Counting entities matching a predicate
    Count,
    /// Checking whether any entity matches a predicate
    Exists,
    /// Adding new entities
    Create,
    /// Replacing or partially updating entities
    Update,
    /// Assigning field values on every match of a predicate
    BulkUpdate,
    /// Removing entities (hard delete)
    Delete,
    /// Soft deleting entities
    SoftDelete,
    /// Restoring a soft-deleted entity
    Restore,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::FindOne => write!(f, "find_one"),
            Self::FindById => write!(f, "find_by_id"),
            Self::FindAll => write!(f, "find_all"),
            Self::Count => write!(f, "count"),
            Self::Exists => write!(f, "exists"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::BulkUpdate => write!(f, "bulk_update"),
            Self::Delete => write!(f, "delete"),
            Self::SoftDelete => write!(f, "soft_delete"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Entity was not found
    NotFound,
    /// Entity already exists (duplicate key)
    AlreadyExists,
    /// A filter, sort, include or update names an unknown field
    UnknownField,
    /// A filter uses an unsupported operator or group logic
    UnsupportedOperator,
    /// A value or operator does not fit the declared field type
    TypeMismatch,
    /// Page request out of range
    InvalidPageRange,
    /// The caller cancelled the operation
    Cancelled,
    /// Store constraint violation
    ConstraintViolation,
    /// Failed to reach the store
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Underlying store error
    StoreError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::UnknownField => write!(f, "unknown_field"),
            Self::UnsupportedOperator => write!(f, "unsupported_operator"),
            Self::TypeMismatch => write!(f, "type_mismatch"),
            Self::InvalidPageRange => write!(f, "invalid_page_range"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::StoreError => write!(f, "store_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use acton_data::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::not_found("User", "42").with_operation(RepositoryOperation::Update);
/// assert_eq!(
///     error.to_string(),
///     "Repository not_found error during update: Entity not found [User: 42]"
/// );
/// assert!(!error.is_retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "User", "Order")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_data::repository::RepositoryError;
    ///
    /// let error = RepositoryError::not_found("User", "usr_123");
    /// assert_eq!(error.entity_type, Some("User".to_string()));
    /// ```
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::FindById,
            RepositoryErrorKind::NotFound,
            "Entity not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Create an "already exists" error with entity context
    pub fn already_exists(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Create,
            RepositoryErrorKind::AlreadyExists,
            "Entity already exists",
        )
        .with_entity(entity_type, identifier)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Cancelled,
            "Operation cancelled",
        )
    }

    /// Create a constraint violation error
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::FindAll,
            RepositoryErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Create a store error
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_data::repository::{RepositoryError, RepositoryOperation};
    ///
    /// let error = RepositoryError::store_error(RepositoryOperation::Create, "disk full");
    /// assert!(error.to_string().contains("store_error"));
    /// ```
    pub fn store_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::StoreError, message)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Add the entity type when no single identifier applies
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }

    /// Check if this error reports a missing entity
    pub fn is_not_found(&self) -> bool {
        self.kind == RepositoryErrorKind::NotFound
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        match (&self.entity_type, &self.entity_id) {
            (Some(entity_type), Some(entity_id)) => write!(f, " [{}: {}]", entity_type, entity_id)?,
            (Some(entity_type), None) => write!(f, " [{}]", entity_type)?,
            _ => {}
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

impl From<QueryError> for RepositoryError {
    fn from(error: QueryError) -> Self {
        let kind = match &error {
            QueryError::UnknownField { .. } => RepositoryErrorKind::UnknownField,
            QueryError::UnsupportedOperator(_) => RepositoryErrorKind::UnsupportedOperator,
            QueryError::TypeMismatch { .. } => RepositoryErrorKind::TypeMismatch,
            QueryError::InvalidPageRange { .. } => RepositoryErrorKind::InvalidPageRange,
        };
        let mut converted = Self::new(RepositoryOperation::Compile, kind, error.to_string());
        if let QueryError::UnknownField { entity, .. } = error {
            converted.entity_type = Some(entity);
        }
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::Compile), "compile");
        assert_eq!(format!("{}", RepositoryOperation::FindOne), "find_one");
        assert_eq!(format!("{}", RepositoryOperation::BulkUpdate), "bulk_update");
        assert_eq!(format!("{}", RepositoryOperation::SoftDelete), "soft_delete");
        assert_eq!(format!("{}", RepositoryOperation::Restore), "restore");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(format!("{}", RepositoryErrorKind::NotFound), "not_found");
        assert_eq!(format!("{}", RepositoryErrorKind::UnknownField), "unknown_field");
        assert_eq!(
            format!("{}", RepositoryErrorKind::InvalidPageRange),
            "invalid_page_range"
        );
        assert_eq!(format!("{}", RepositoryErrorKind::Cancelled), "cancelled");
        assert_eq!(format!("{}", RepositoryErrorKind::StoreError), "store_error");
    }

    #[test]
    fn test_not_found_convenience() {
        let error = RepositoryError::not_found("User", "usr_123");
        assert_eq!(error.operation, RepositoryOperation::FindById);
        assert!(error.is_not_found());
        assert_eq!(error.entity_type, Some("User".to_string()));
        assert_eq!(error.entity_id, Some("usr_123".to_string()));
    }

    #[test]
    fn test_is_retriable() {
        assert!(RepositoryError::connection_failed("refused").is_retriable());
        assert!(RepositoryError::timeout(RepositoryOperation::FindAll, "slow").is_retriable());
        assert!(!RepositoryError::not_found("User", "123").is_retriable());
        assert!(!RepositoryError::cancelled(RepositoryOperation::Update).is_retriable());
        assert!(
            !RepositoryError::constraint_violation(RepositoryOperation::Create, "fk")
                .is_retriable()
        );
    }

    #[test]
    fn test_display_with_and_without_entity() {
        let plain = RepositoryError::store_error(RepositoryOperation::Create, "disk full");
        assert_eq!(
            plain.to_string(),
            "Repository store_error error during create: disk full"
        );

        let with_entity = RepositoryError::not_found("User", "usr_123");
        assert!(with_entity.to_string().ends_with("[User: usr_123]"));

        let type_only = plain.with_entity_type("User");
        assert!(type_only.to_string().ends_with("disk full [User]"));
    }

    #[test]
    fn test_from_query_error_maps_kind() {
        let unknown: RepositoryError = QueryError::unknown_field("User", "nickname").into();
        assert_eq!(unknown.kind, RepositoryErrorKind::UnknownField);
        assert_eq!(unknown.entity_type, Some("User".to_string()));
        assert!(unknown.message.contains("nickname"));

        let range: RepositoryError = QueryError::InvalidPageRange {
            index: 2,
            size: 3,
            from: 3,
        }
        .into();
        assert_eq!(range.kind, RepositoryErrorKind::InvalidPageRange);
        assert_eq!(range.operation, RepositoryOperation::Compile);

        let op: RepositoryError = QueryError::UnsupportedOperator("like".to_string()).into();
        assert_eq!(op.kind, RepositoryErrorKind::UnsupportedOperator);
    }
}
