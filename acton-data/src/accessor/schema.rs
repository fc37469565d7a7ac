//! Field descriptions compiled into typed accessors

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::query::{
    typed_comparison, FieldKind, FieldType, FieldValue, FilterOperator, OrderBy, Predicate,
    QueryError, SortDirection,
};

use super::IS_DELETED;

/// A record type whose fields can be addressed by name at runtime
///
/// Implementations register every field that filters, sorts or field updates
/// may name. Registering the same name twice, or two names that only differ
/// by case and underscores, panics when the schema is first built.
pub trait Describe: Sized + Send + Sync + 'static {
    /// Type name used in errors and logs
    const NAME: &'static str;

    /// Register the addressable fields
    fn describe(schema: &mut SchemaBuilder<Self>);
}

type Getter<T> = Box<dyn Fn(&T) -> FieldValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, FieldValue) -> Result<(), QueryError> + Send + Sync>;
type Copier<T> = Box<dyn Fn(&T, &mut T) + Send + Sync>;
type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;
type PredicateFactory<T> =
    Box<dyn Fn(FilterOperator, FieldValue) -> Result<Predicate<T>, QueryError> + Send + Sync>;

/// Compiled accessors for one field of `T`
pub struct FieldAccessor<T> {
    name: &'static str,
    field_type: FieldType,
    getter: Getter<T>,
    setter: Setter<T>,
    copier: Copier<T>,
    comparator: Comparator<T>,
    predicate: PredicateFactory<T>,
}

impl<T: 'static> FieldAccessor<T> {
    fn new<V, G, M>(name: &'static str, get: G, get_mut: M) -> Self
    where
        V: FieldKind,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let get = Arc::new(get);
        let get_mut = Arc::new(get_mut);

        let getter: Getter<T> = {
            let get = Arc::clone(&get);
            Box::new(move |item: &T| (*get)(item).to_value())
        };

        let setter: Setter<T> = {
            let get_mut = Arc::clone(&get_mut);
            Box::new(move |item: &mut T, value: FieldValue| {
                let converted = V::from_value(value.clone())
                    .or_else(|| {
                        serde_json::to_value(&value)
                            .ok()
                            .and_then(|json| FieldValue::coerce(&json, V::TYPE).ok())
                            .and_then(V::from_value)
                    })
                    .ok_or_else(|| {
                        QueryError::type_mismatch(name, V::TYPE, format!("cannot assign {}", value))
                    })?;
                *(*get_mut)(item) = converted;
                Ok(())
            })
        };

        let copier: Copier<T> = {
            let get = Arc::clone(&get);
            Box::new(move |source: &T, target: &mut T| {
                *(*get_mut)(target) = (*get)(source).clone();
            })
        };

        let comparator: Comparator<T> = {
            let get = Arc::clone(&get);
            Arc::new(move |a: &T, b: &T| (*get)(a).compare((*get)(b)))
        };

        let predicate: PredicateFactory<T> =
            Box::new(move |operator: FilterOperator, operand: FieldValue| {
                typed_comparison::<T, V, G>(name, Arc::clone(&get), operator, operand)
            });

        Self {
            name,
            field_type: V::TYPE,
            getter,
            setter,
            copier,
            comparator,
            predicate,
        }
    }

    /// Registered field name
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Read the field
    pub fn get(&self, item: &T) -> FieldValue {
        (self.getter)(item)
    }

    /// Write the field, converting `value` to the field's Rust type
    pub fn set(&self, item: &mut T, value: FieldValue) -> Result<(), QueryError> {
        (self.setter)(item, value)
    }

    /// Copy the field from `source` onto `target`
    pub fn copy(&self, source: &T, target: &mut T) {
        (self.copier)(source, target);
    }

    /// Compare two records on this field
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.comparator)(a, b)
    }

    /// Ordering on this field in the given direction
    #[must_use]
    pub fn order(&self, direction: SortDirection) -> OrderBy<T> {
        let ordering = OrderBy::from_shared(Arc::clone(&self.comparator));
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Compile a comparison against an untyped operand
    ///
    /// The operand is ignored by `isnull` / `isnotnull`; every other operator
    /// converts it to the declared field type first.
    pub fn predicate(
        &self,
        operator: FilterOperator,
        operand: &serde_json::Value,
    ) -> Result<Predicate<T>, QueryError> {
        let value = if operator.is_null_test() {
            FieldValue::Null
        } else {
            FieldValue::coerce(operand, self.field_type)
                .map_err(|detail| QueryError::type_mismatch(self.name, self.field_type, detail))?
        };
        (self.predicate)(operator, value)
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .finish_non_exhaustive()
    }
}

fn lookup_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Collects field registrations for one entity type
pub struct SchemaBuilder<T> {
    entity: &'static str,
    fields: Vec<FieldAccessor<T>>,
}

impl<T: 'static> SchemaBuilder<T> {
    fn new(entity: &'static str) -> Self {
        Self {
            entity,
            fields: Vec::new(),
        }
    }

    /// Register a field through a shared and a mutable projection
    ///
    /// # Panics
    ///
    /// Panics when `name` collides with an already registered field.
    pub fn field<V, G, M>(&mut self, name: &'static str, get: G, get_mut: M) -> &mut Self
    where
        V: FieldKind,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let key = lookup_key(name);
        if let Some(existing) = self.fields.iter().find(|f| lookup_key(f.name) == key) {
            panic!(
                "field `{}` collides with `{}` on {}",
                name, existing.name, self.entity
            );
        }
        self.fields.push(FieldAccessor::new(name, get, get_mut));
        self
    }

    fn finish(self) -> Schema<T> {
        let mut by_name = HashMap::with_capacity(self.fields.len());
        let mut by_key = HashMap::with_capacity(self.fields.len());
        for (position, field) in self.fields.iter().enumerate() {
            by_name.insert(field.name, position);
            by_key.insert(lookup_key(field.name), position);
        }
        let deleted_flag = by_name
            .get(IS_DELETED)
            .or_else(|| by_key.get(&lookup_key(IS_DELETED)))
            .copied();
        Schema {
            entity: self.entity,
            fields: self.fields,
            by_name,
            by_key,
            deleted_flag,
        }
    }
}

/// All compiled accessors of one entity type
///
/// Obtained through [`accessors`](super::accessors). Immutable once built and
/// safe to share between threads.
pub struct Schema<T> {
    entity: &'static str,
    fields: Vec<FieldAccessor<T>>,
    by_name: HashMap<&'static str, usize>,
    by_key: HashMap<String, usize>,
    deleted_flag: Option<usize>,
}

impl<T: Describe> Schema<T> {
    pub(super) fn build() -> Self {
        let mut builder = SchemaBuilder::new(T::NAME);
        T::describe(&mut builder);
        builder.finish()
    }
}

impl<T: 'static> Schema<T> {
    /// Entity type name
    #[must_use]
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Resolve a field by name
    ///
    /// An exact match wins; otherwise names are compared ignoring ASCII case
    /// and underscores, so `"IsDeleted"` resolves `is_deleted`.
    pub fn field(&self, name: &str) -> Result<&FieldAccessor<T>, QueryError> {
        self.by_name
            .get(name)
            .or_else(|| self.by_key.get(&lookup_key(name)))
            .map(|&position| &self.fields[position])
            .ok_or_else(|| QueryError::unknown_field(self.entity, name))
    }

    /// Resolve several fields, failing on the first unknown one
    pub fn require(&self, names: &[&str]) -> Result<Vec<&FieldAccessor<T>>, QueryError> {
        names.iter().map(|name| self.field(name)).collect()
    }

    /// Whether `name` resolves to a field
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_ok()
    }

    /// Registered fields in registration order
    pub fn iter(&self) -> impl Iterator<Item = &FieldAccessor<T>> {
        self.fields.iter()
    }

    /// Number of registered fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the entity carries the soft-delete flag
    #[must_use]
    pub fn is_soft_deletable(&self) -> bool {
        self.deleted_flag.is_some()
    }

    /// Read the soft-delete flag; entities without one are never deleted
    pub fn is_deleted(&self, item: &T) -> bool {
        self.deleted_flag
            .is_some_and(|position| self.fields[position].get(item) == FieldValue::Boolean(true))
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("entity", &self.entity)
            .field("fields", &self.fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ValueKind;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone, Default)]
    struct Note {
        title: String,
        views: i64,
        is_deleted: bool,
        deleted_date: Option<DateTime<Utc>>,
    }

    impl Describe for Note {
        const NAME: &'static str = "Note";

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .field("title", |n: &Note| &n.title, |n: &mut Note| &mut n.title)
                .field("views", |n: &Note| &n.views, |n: &mut Note| &mut n.views)
                .field(
                    "is_deleted",
                    |n: &Note| &n.is_deleted,
                    |n: &mut Note| &mut n.is_deleted,
                )
                .field(
                    "deleted_date",
                    |n: &Note| &n.deleted_date,
                    |n: &mut Note| &mut n.deleted_date,
                );
        }
    }

    #[test]
    fn test_field_lookup_ignores_case_and_underscores() {
        let schema = Schema::<Note>::build();
        assert_eq!(schema.field("title").unwrap().name(), "title");
        assert_eq!(schema.field("IsDeleted").unwrap().name(), "is_deleted");
        assert_eq!(schema.field("DELETED_DATE").unwrap().name(), "deleted_date");
        assert_eq!(
            schema.field("author").unwrap_err(),
            QueryError::unknown_field("Note", "author")
        );
    }

    #[test]
    fn test_declared_types() {
        let schema = Schema::<Note>::build();
        assert_eq!(
            schema.field("views").unwrap().field_type(),
            FieldType::required(ValueKind::Integer)
        );
        assert_eq!(
            schema.field("deleted_date").unwrap().field_type(),
            FieldType::nullable(ValueKind::DateTime)
        );
    }

    #[test]
    fn test_get_set_copy() {
        let schema = Schema::<Note>::build();
        let views = schema.field("views").unwrap();

        let mut note = Note::default();
        views.set(&mut note, FieldValue::Integer(12)).unwrap();
        assert_eq!(note.views, 12);
        assert_eq!(views.get(&note), FieldValue::Integer(12));

        let err = views.set(&mut note, FieldValue::from("many")).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
        assert_eq!(note.views, 12);

        // values arriving with another kind are coerced like filter operands
        views.set(&mut note, FieldValue::from("41")).unwrap();
        assert_eq!(note.views, 41);
        let id = uuid::Uuid::now_v7();
        schema
            .field("title")
            .unwrap()
            .set(&mut note, FieldValue::Uuid(id))
            .unwrap();
        assert_eq!(note.title, id.to_string());

        let mut other = Note::default();
        views.copy(&note, &mut other);
        assert_eq!(other.views, 12);
    }

    #[test]
    fn test_require_fails_loudly() {
        let schema = Schema::<Note>::build();
        assert_eq!(schema.require(&["title", "views"]).unwrap().len(), 2);
        assert!(matches!(
            schema.require(&["title", "deleted_by"]),
            Err(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_soft_delete_flag() {
        let schema = Schema::<Note>::build();
        assert!(schema.is_soft_deletable());

        let mut note = Note::default();
        assert!(!schema.is_deleted(&note));
        note.is_deleted = true;
        assert!(schema.is_deleted(&note));
    }

    #[derive(Clone, Default)]
    struct Ledger {
        flagged: bool,
    }

    impl Describe for Ledger {
        const NAME: &'static str = "Ledger";

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.field(
                "IsDeleted",
                |l: &Ledger| &l.flagged,
                |l: &mut Ledger| &mut l.flagged,
            );
        }
    }

    #[test]
    fn test_soft_delete_flag_resolves_any_spelling() {
        let schema = Schema::<Ledger>::build();
        assert!(schema.is_soft_deletable());

        let mut ledger = Ledger::default();
        assert!(!schema.is_deleted(&ledger));
        ledger.flagged = true;
        assert!(schema.is_deleted(&ledger));
    }

    #[derive(Clone)]
    struct Clashing {
        is_deleted: bool,
    }

    impl Describe for Clashing {
        const NAME: &'static str = "Clashing";

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .field(
                    "is_deleted",
                    |c: &Clashing| &c.is_deleted,
                    |c: &mut Clashing| &mut c.is_deleted,
                )
                .field(
                    "isDeleted",
                    |c: &Clashing| &c.is_deleted,
                    |c: &mut Clashing| &mut c.is_deleted,
                );
        }
    }

    #[test]
    #[should_panic(expected = "collides")]
    fn test_colliding_names_panic() {
        let _ = Schema::<Clashing>::build();
    }
}
