//! Filter trees compiled into executable predicates
//!
//! [`compile_filter`] walks a [`Filter`] once, resolves every field through
//! the entity's cached [`Schema`](crate::accessor::Schema) and produces a
//! single [`Predicate`] closure. Nothing is re-parsed when the predicate runs.
//!
//! # Null handling
//!
//! - `lt`, `lte`, `gt` and `gte` are false whenever either side is null
//! - `eq null` matches null values, `neq null` matches non-null values
//! - `isnull` / `isnotnull` are only accepted on nullable fields
//! - `contains`, `startswith` and `endswith` never match a null value
//!
//! # Example
//!
//! ```rust
//! use acton_data::accessor::{Describe, SchemaBuilder};
//! use acton_data::query::{compile_filter, Filter};
//!
//! struct City {
//!     name: String,
//!     population: i64,
//! }
//!
//! impl Describe for City {
//!     const NAME: &'static str = "City";
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .field("name", |c: &City| &c.name, |c: &mut City| &mut c.name)
//!             .field("population", |c: &City| &c.population, |c: &mut City| &mut c.population);
//!     }
//! }
//!
//! let large = compile_filter::<City>(&Filter::gt("Population", 1_000_000)).unwrap();
//! assert!(large.evaluate(&City { name: "Lagos".into(), population: 15_000_000 }));
//! assert!(!large.evaluate(&City { name: "Ghent".into(), population: 260_000 }));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::accessor::{accessors, Describe, Schema};

use super::error::QueryError;
use super::model::{Filter, FilterLogic, FilterOperator};
use super::value::{FieldKind, FieldValue};

/// A compiled boolean test over records of type `T`
///
/// Cloning is cheap; clones share the same closure.
pub struct Predicate<T>(Arc<dyn Fn(&T) -> bool + Send + Sync>);

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

impl<T: 'static> Predicate<T> {
    /// Wrap a closure
    pub fn new(test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(test))
    }

    /// A predicate that accepts every record
    #[must_use]
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Run the test
    pub fn evaluate(&self, item: &T) -> bool {
        (self.0)(item)
    }

    /// Both predicates must hold
    #[must_use]
    pub fn and(self, other: Predicate<T>) -> Self {
        Self::new(move |item| self.evaluate(item) && other.evaluate(item))
    }

    /// At least one predicate must hold
    #[must_use]
    pub fn or(self, other: Predicate<T>) -> Self {
        Self::new(move |item| self.evaluate(item) || other.evaluate(item))
    }

    /// Negation
    #[must_use]
    pub fn not(self) -> Self {
        Self::new(move |item| !self.evaluate(item))
    }
}

/// Compile a filter tree against the registered fields of `T`
///
/// Leaves resolve their field (exact name first, then ignoring case and
/// underscores), parse their operator and convert their value to the
/// field's declared type. Groups fold their children left to right with
/// `and` unless `logic` says `or`. A group that also names a field
/// contributes that comparison as its first operand.
///
/// # Errors
///
/// - [`QueryError::UnknownField`] when a field is empty or not registered
/// - [`QueryError::UnsupportedOperator`] for an unknown operator or logic
/// - [`QueryError::TypeMismatch`] when the operator or value does not fit
///   the field
pub fn compile_filter<T: Describe>(filter: &Filter) -> Result<Predicate<T>, QueryError> {
    let schema = accessors::<T>();
    compile_node(&schema, filter)
}

fn compile_node<T: 'static>(
    schema: &Schema<T>,
    filter: &Filter,
) -> Result<Predicate<T>, QueryError> {
    if !filter.is_group() {
        return compile_leaf(schema, filter);
    }

    let logic = FilterLogic::parse(filter.logic.as_deref())?;
    let mut operands = Vec::with_capacity(filter.filters.len() + 1);
    if !filter.field.trim().is_empty() {
        operands.push(compile_leaf(schema, filter)?);
    }
    for child in &filter.filters {
        operands.push(compile_node(schema, child)?);
    }

    let combined = operands.into_iter().reduce(|acc, next| match logic {
        FilterLogic::And => acc.and(next),
        FilterLogic::Or => acc.or(next),
    });
    Ok(combined.unwrap_or_else(Predicate::always))
}

fn compile_leaf<T: 'static>(
    schema: &Schema<T>,
    filter: &Filter,
) -> Result<Predicate<T>, QueryError> {
    let name = filter.field.trim();
    if name.is_empty() {
        return Err(QueryError::unknown_field(schema.entity(), name));
    }
    let accessor = schema.field(name)?;
    let operator: FilterOperator = filter.operator.parse()?;
    accessor.predicate(operator, &filter.value)
}

/// Build the comparison for one field of Rust type `V`
///
/// `operand` has already been coerced to the field's declared type, or is
/// [`FieldValue::Null`] for the null tests.
pub(crate) fn typed_comparison<T, V, G>(
    field: &'static str,
    get: Arc<G>,
    operator: FilterOperator,
    operand: FieldValue,
) -> Result<Predicate<T>, QueryError>
where
    T: 'static,
    V: FieldKind,
    G: Fn(&T) -> &V + Send + Sync + 'static,
{
    if operator.is_text_only() && !V::TYPE.is_text() {
        return Err(QueryError::type_mismatch(
            field,
            V::TYPE,
            format!("operator `{}` only applies to strings", operator),
        ));
    }

    if operator.is_null_test() && !V::TYPE.nullable {
        return Err(QueryError::type_mismatch(
            field,
            V::TYPE,
            format!("operator `{}` needs a nullable field", operator),
        ));
    }

    if operand.is_null() {
        return Ok(match operator {
            FilterOperator::Eq | FilterOperator::IsNull => null_check::<T, V, G>(get, true),
            FilterOperator::Neq | FilterOperator::IsNotNull => null_check::<T, V, G>(get, false),
            _ => Predicate::new(|_: &T| false),
        });
    }

    let target = V::from_value(operand.clone()).ok_or_else(|| {
        QueryError::type_mismatch(field, V::TYPE, format!("cannot compare with {}", operand))
    })?;

    let predicate = match operator {
        FilterOperator::Eq => {
            Predicate::new(move |item: &T| (*get)(item).compare(&target) == Ordering::Equal)
        }
        FilterOperator::Neq => {
            Predicate::new(move |item: &T| (*get)(item).compare(&target) != Ordering::Equal)
        }
        FilterOperator::Lt => ordered(get, target, Ordering::is_lt),
        FilterOperator::Lte => ordered(get, target, Ordering::is_le),
        FilterOperator::Gt => ordered(get, target, Ordering::is_gt),
        FilterOperator::Gte => ordered(get, target, Ordering::is_ge),
        FilterOperator::Contains => {
            textual(get, target, |haystack, needle| haystack.contains(needle))
        }
        FilterOperator::StartsWith => {
            textual(get, target, |haystack, needle| haystack.starts_with(needle))
        }
        FilterOperator::EndsWith => {
            textual(get, target, |haystack, needle| haystack.ends_with(needle))
        }
        FilterOperator::IsNull => null_check::<T, V, G>(get, true),
        FilterOperator::IsNotNull => null_check::<T, V, G>(get, false),
    };
    Ok(predicate)
}

fn null_check<T, V, G>(get: Arc<G>, want_null: bool) -> Predicate<T>
where
    T: 'static,
    V: FieldKind,
    G: Fn(&T) -> &V + Send + Sync + 'static,
{
    Predicate::new(move |item: &T| (*get)(item).is_null() == want_null)
}

fn ordered<T, V, G>(get: Arc<G>, target: V, accept: fn(Ordering) -> bool) -> Predicate<T>
where
    T: 'static,
    V: FieldKind,
    G: Fn(&T) -> &V + Send + Sync + 'static,
{
    Predicate::new(move |item: &T| {
        let value = (*get)(item);
        !value.is_null() && accept(value.compare(&target))
    })
}

fn textual<T, V, G>(get: Arc<G>, target: V, accept: fn(&str, &str) -> bool) -> Predicate<T>
where
    T: 'static,
    V: FieldKind,
    G: Fn(&T) -> &V + Send + Sync + 'static,
{
    Predicate::new(move |item: &T| match ((*get)(item).text(), target.text()) {
        (Some(haystack), Some(needle)) => accept(haystack, needle),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{people, Person};
    use serde_json::json;

    fn names(filter: &Filter) -> Vec<String> {
        let predicate = compile_filter::<Person>(filter).unwrap();
        people()
            .into_iter()
            .filter(|p| predicate.evaluate(p))
            .map(|p| p.name)
            .collect()
    }

    #[test]
    fn test_eq_selects_exactly_the_matching_record() {
        let filter: Filter = serde_json::from_value(json!({
            "field": "Name",
            "operator": "eq",
            "value": "Bob"
        }))
        .unwrap();
        assert_eq!(names(&filter), vec!["Bob"]);
    }

    #[test]
    fn test_or_is_union_of_children() {
        let left = Filter::eq("name", "Alice");
        let right = Filter::gte("age", 40);
        let mut expected: Vec<String> = names(&left);
        for name in names(&right) {
            if !expected.contains(&name) {
                expected.push(name);
            }
        }
        let mut union = names(&left.or(right));
        union.sort();
        expected.sort();
        assert_eq!(union, expected);
    }

    #[test]
    fn test_group_without_logic_means_and() {
        let filter = Filter {
            filters: vec![Filter::gte("age", 30), Filter::starts_with("name", "C")],
            ..Filter::default()
        };
        assert_eq!(names(&filter), vec!["Charlie"]);
    }

    #[test]
    fn test_group_with_own_field_is_first_operand() {
        let filter = Filter {
            field: "name".to_string(),
            operator: "eq".to_string(),
            value: json!("Alice"),
            logic: Some("or".to_string()),
            filters: vec![Filter::eq("name", "Bob")],
        };
        assert_eq!(names(&filter), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_compiling_twice_agrees() {
        let filter = Filter::contains("name", "li").or(Filter::lt("age", 26));
        let first = compile_filter::<Person>(&filter).unwrap();
        let second = compile_filter::<Person>(&filter).unwrap();
        for person in people() {
            assert_eq!(first.evaluate(&person), second.evaluate(&person));
        }
    }

    #[test]
    fn test_unknown_field_and_operator() {
        assert_eq!(
            compile_filter::<Person>(&Filter::eq("nickname", "x")).unwrap_err(),
            QueryError::unknown_field("Person", "nickname")
        );

        let filter = Filter {
            field: "name".to_string(),
            operator: "like".to_string(),
            value: json!("B%"),
            ..Filter::default()
        };
        assert_eq!(
            compile_filter::<Person>(&filter).unwrap_err(),
            QueryError::UnsupportedOperator("like".to_string())
        );

        let bad_logic = Filter {
            logic: Some("xor".to_string()),
            filters: vec![Filter::eq("name", "Bob")],
            ..Filter::default()
        };
        assert!(matches!(
            compile_filter::<Person>(&bad_logic),
            Err(QueryError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_type_mismatches() {
        let text_on_number = compile_filter::<Person>(&Filter::contains("age", "3"));
        assert!(matches!(text_on_number, Err(QueryError::TypeMismatch { .. })));

        let null_test_on_required = compile_filter::<Person>(&Filter::is_null("name"));
        assert!(matches!(null_test_on_required, Err(QueryError::TypeMismatch { .. })));

        let bad_value = compile_filter::<Person>(&Filter::gt("age", "old"));
        assert!(matches!(bad_value, Err(QueryError::TypeMismatch { .. })));
    }

    #[test]
    fn test_null_semantics() {
        assert_eq!(names(&Filter::is_null("email")), vec!["Charlie"]);
        assert_eq!(names(&Filter::eq("email", json!(null))), vec!["Charlie"]);
        assert_eq!(names(&Filter::neq("email", json!(null))), vec!["Alice", "Bob"]);
        assert!(names(&Filter::lt("email", json!(null))).is_empty());
        assert_eq!(names(&Filter::gte("email", "a")), vec!["Alice", "Bob"]);
        assert_eq!(names(&Filter::ends_with("email", "@example.com")).len(), 2);
    }

    #[test]
    fn test_predicate_combinators() {
        let adult = Predicate::new(|p: &Person| p.age >= 30);
        let named_bob = Predicate::new(|p: &Person| p.name == "Bob");
        let bob = people().into_iter().find(|p| p.name == "Bob").unwrap();

        assert!(adult.clone().or(named_bob.clone()).evaluate(&bob));
        assert!(!adult.clone().and(named_bob.clone()).evaluate(&bob));
        assert!(named_bob.not().not().evaluate(&bob));
        assert!(Predicate::<Person>::always().evaluate(&bob));
    }
}
