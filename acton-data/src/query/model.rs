//! Filter and sort descriptions
//!
//! These are plain data: they are usually deserialized from a request body,
//! validated, then compiled once against an entity type.
//!
//! # Example
//!
//! ```rust
//! use acton_data::query::{DynamicQuery, Filter, Sort};
//!
//! let query: DynamicQuery = serde_json::from_value(serde_json::json!({
//!     "sort": [{ "field": "name", "dir": "desc" }],
//!     "filter": {
//!         "logic": "or",
//!         "filters": [
//!             { "field": "name", "operator": "eq", "value": "Bob" },
//!             { "field": "age", "operator": "gte", "value": 30 }
//!         ]
//!     }
//! }))
//! .unwrap();
//!
//! assert_eq!(query.sort, vec![Sort::desc("name")]);
//! assert!(query.filter.as_ref().unwrap().is_group());
//!
//! let built = DynamicQuery::new()
//!     .with_filter(Filter::eq("name", "Bob").or(Filter::gte("age", 30)))
//!     .with_sort(Sort::desc("name"));
//! assert_eq!(built, query);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::QueryError;

/// Comparison operators understood by the predicate compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Neq,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Substring match (strings only)
    Contains,
    /// Prefix match (strings only)
    StartsWith,
    /// Suffix match (strings only)
    EndsWith,
    /// Value is null (nullable fields only)
    IsNull,
    /// Value is not null (nullable fields only)
    IsNotNull,
}

impl FilterOperator {
    /// Whether the operator only applies to string fields
    #[must_use]
    pub const fn is_text_only(&self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    /// Whether the operator tests nullability and ignores the filter value
    #[must_use]
    pub const fn is_null_test(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Canonical wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::IsNull => "isnull",
            Self::IsNotNull => "isnotnull",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "contains" => Ok(Self::Contains),
            "startswith" => Ok(Self::StartsWith),
            "endswith" => Ok(Self::EndsWith),
            "isnull" => Ok(Self::IsNull),
            "isnotnull" => Ok(Self::IsNotNull),
            _ => Err(QueryError::UnsupportedOperator(s.to_string())),
        }
    }
}

/// How the children of a group filter are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterLogic {
    /// Every child must match
    #[default]
    And,
    /// At least one child must match
    Or,
}

impl FilterLogic {
    /// Parse the optional `logic` string of a filter; absent means `and`
    pub fn parse(logic: Option<&str>) -> Result<Self, QueryError> {
        match logic.map(|l| l.trim().to_ascii_lowercase()) {
            None => Ok(Self::And),
            Some(l) if l.is_empty() || l == "and" => Ok(Self::And),
            Some(l) if l == "or" => Ok(Self::Or),
            Some(_) => Err(QueryError::UnsupportedOperator(
                logic.unwrap_or_default().to_string(),
            )),
        }
    }
}

impl fmt::Display for FilterLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

/// One comparison, or a boolean group of filters
///
/// A filter with children is a group node. A filter without children is a
/// leaf comparison and needs both `field` and `operator`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    /// Name of the field on the target entity
    #[serde(skip_serializing_if = "String::is_empty")]
    pub field: String,
    /// Operator name, see [`FilterOperator`]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub operator: String,
    /// Untyped operand, converted to the field type at compile time
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
    /// `and` / `or`, only meaningful for groups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    /// Child filters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

impl Filter {
    /// Create a leaf comparison
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value: value.into(),
            logic: None,
            filters: Vec::new(),
        }
    }

    /// Create a group combining `filters` with `logic`
    pub fn group(logic: FilterLogic, filters: Vec<Filter>) -> Self {
        Self {
            logic: Some(logic.to_string()),
            filters,
            ..Self::default()
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// `field != value`
    pub fn neq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, FilterOperator::Neq, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, FilterOperator::Lt, value)
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, FilterOperator::Lte, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, FilterOperator::Gt, value)
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, FilterOperator::Gte, value)
    }

    /// Substring match
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Contains, value.into())
    }

    /// Prefix match
    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::StartsWith, value.into())
    }

    /// Suffix match
    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::EndsWith, value.into())
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, serde_json::Value::Null)
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, serde_json::Value::Null)
    }

    /// Combine with another filter using AND
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        self.join(FilterLogic::And, other)
    }

    /// Combine with another filter using OR
    #[must_use]
    pub fn or(self, other: Filter) -> Self {
        self.join(FilterLogic::Or, other)
    }

    fn join(self, logic: FilterLogic, other: Filter) -> Self {
        // Extend an existing bare group of the same logic instead of nesting
        let same_logic = FilterLogic::parse(self.logic.as_deref()).ok() == Some(logic);
        if self.is_group() && self.field.is_empty() && same_logic {
            let mut group = self;
            group.filters.push(other);
            group
        } else {
            Self::group(logic, vec![self, other])
        }
    }

    /// Whether this node combines child filters
    #[must_use]
    pub fn is_group(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Advisory structural check
    ///
    /// A leaf is valid when both `field` and `operator` are non-empty. A
    /// group is valid when all its children are valid and its own
    /// field/operator pair is either complete or absent. The compiler checks
    /// field resolution and operator support independently.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let has_field = !self.field.trim().is_empty();
        let has_operator = !self.operator.trim().is_empty();

        if self.is_group() {
            has_field == has_operator && self.filters.iter().all(Filter::is_valid)
        } else {
            has_field && has_operator
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

impl SortDirection {
    /// Interpret a raw `dir` string
    ///
    /// `"asc"` (any case) is ascending; every other value, including typos,
    /// is descending.
    #[must_use]
    pub fn parse_lenient(dir: &str) -> Self {
        if dir.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// One ordering key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    /// Name of the field on the target entity
    pub field: String,
    /// `asc` or `desc`
    #[serde(default = "default_dir")]
    pub dir: String,
    /// Application order among several keys; lower applies first
    #[serde(default)]
    pub priority: i32,
}

fn default_dir() -> String {
    SortDirection::Asc.to_string()
}

impl Sort {
    /// Create a sort key with an explicit direction
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            dir: direction.to_string(),
            priority: 0,
        }
    }

    /// Ascending sort on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    /// Descending sort on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Effective direction of this key
    #[must_use]
    pub fn direction(&self) -> SortDirection {
        SortDirection::parse_lenient(&self.dir)
    }
}

/// A complete "list with criteria" request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DynamicQuery {
    /// Ordering keys
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
    /// Root filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

impl DynamicQuery {
    /// An empty query: no filter, no ordering
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root filter
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append an ordering key
    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse_is_case_insensitive() {
        assert_eq!("StartsWith".parse::<FilterOperator>(), Ok(FilterOperator::StartsWith));
        assert_eq!("ISNULL".parse::<FilterOperator>(), Ok(FilterOperator::IsNull));
        assert_eq!(
            "like".parse::<FilterOperator>(),
            Err(QueryError::UnsupportedOperator("like".to_string()))
        );
    }

    #[test]
    fn test_operator_round_trips_through_name() {
        for op in [
            FilterOperator::Eq,
            FilterOperator::Neq,
            FilterOperator::Lt,
            FilterOperator::Lte,
            FilterOperator::Gt,
            FilterOperator::Gte,
            FilterOperator::Contains,
            FilterOperator::StartsWith,
            FilterOperator::EndsWith,
            FilterOperator::IsNull,
            FilterOperator::IsNotNull,
        ] {
            assert_eq!(op.as_str().parse::<FilterOperator>(), Ok(op));
        }
    }

    #[test]
    fn test_logic_defaults_to_and() {
        assert_eq!(FilterLogic::parse(None), Ok(FilterLogic::And));
        assert_eq!(FilterLogic::parse(Some("OR")), Ok(FilterLogic::Or));
        assert_eq!(
            FilterLogic::parse(Some("xor")),
            Err(QueryError::UnsupportedOperator("xor".to_string()))
        );
    }

    #[test]
    fn test_sort_direction_fallback() {
        assert_eq!(Sort::asc("name").direction(), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient("ASC"), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient("upwards"), SortDirection::Desc);
    }

    #[test]
    fn test_validator() {
        assert!(Filter::eq("name", "Bob").is_valid());
        assert!(!Filter::default().is_valid());
        assert!(!Filter {
            field: "name".to_string(),
            ..Filter::default()
        }
        .is_valid());

        let group = Filter::eq("name", "Bob").or(Filter::default());
        assert!(!group.is_valid());
        assert!(Filter::eq("a", 1).and(Filter::eq("b", 2)).is_valid());
    }

    #[test]
    fn test_join_flattens_same_logic() {
        let filter = Filter::eq("a", 1).or(Filter::eq("b", 2)).or(Filter::eq("c", 3));
        assert_eq!(filter.filters.len(), 3);

        let mixed = Filter::eq("a", 1).or(Filter::eq("b", 2)).and(Filter::eq("c", 3));
        assert_eq!(mixed.filters.len(), 2);
        assert!(mixed.filters[0].is_group());
    }

    #[test]
    fn test_sort_deserialization_defaults() {
        let sort: Sort = serde_json::from_value(json!({ "field": "name" })).unwrap();
        assert_eq!(sort.dir, "asc");
        assert_eq!(sort.priority, 0);
    }

    #[test]
    fn test_filter_serialization_skips_empty_parts() {
        let json = serde_json::to_value(Filter::is_null("deleted_by")).unwrap();
        assert_eq!(json, json!({ "field": "deleted_by", "operator": "isnull" }));
    }
}
