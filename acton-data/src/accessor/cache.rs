//! Process-wide schema cache
//!
//! One [`Schema`] per entity type, keyed by `TypeId` in a shared `DashMap`.
//! Entries are never evicted.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::schema::{Describe, Schema};

type Entry = Arc<dyn Any + Send + Sync>;

static SCHEMAS: Lazy<DashMap<TypeId, Entry>> = Lazy::new(DashMap::new);

/// Cached accessors for `T`, built from [`Describe::describe`] on first use
///
/// Two threads racing on the first lookup may both build a schema, but only
/// one is stored and both receive the stored one.
pub fn accessors<T: Describe>() -> Arc<Schema<T>> {
    let key = TypeId::of::<T>();

    if let Some(entry) = SCHEMAS.get(&key) {
        if let Some(schema) = downcast::<T>(entry.value()) {
            return schema;
        }
    }

    // Build outside the map lock so describe() may look up other schemas
    let built: Entry = Arc::new(Schema::<T>::build());
    let stored = Arc::clone(SCHEMAS.entry(key).or_insert(built).value());
    tracing::debug!(entity = T::NAME, "Field accessors cached");

    match downcast::<T>(&stored) {
        Some(schema) => schema,
        // TypeId keys make a mismatched entry impossible
        None => Arc::new(Schema::<T>::build()),
    }
}

fn downcast<T: Describe>(entry: &Entry) -> Option<Arc<Schema<T>>> {
    Arc::clone(entry).downcast::<Schema<T>>().ok()
}

/// Number of entity types with a cached schema
#[must_use]
pub fn cached_types() -> usize {
    SCHEMAS.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::SchemaBuilder;

    struct Probe {
        value: i64,
    }

    impl Describe for Probe {
        const NAME: &'static str = "Probe";

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.field("value", |p: &Probe| &p.value, |p: &mut Probe| &mut p.value);
        }
    }

    struct Racer {
        label: String,
    }

    impl Describe for Racer {
        const NAME: &'static str = "Racer";

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.field("label", |r: &Racer| &r.label, |r: &mut Racer| &mut r.label);
        }
    }

    #[test]
    fn test_second_lookup_returns_cached_entry() {
        let first = accessors::<Probe>();
        let second = accessors::<Probe>();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cached_types() >= 1);
        assert_eq!(first.entity(), "Probe");
    }

    #[test]
    fn test_concurrent_first_access_shares_one_entry() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(accessors::<Racer>))
            .collect();
        let schemas: Vec<Arc<Schema<Racer>>> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        for schema in &schemas[1..] {
            assert!(Arc::ptr_eq(&schemas[0], schema));
        }
        assert!(Arc::ptr_eq(&schemas[0], &accessors::<Racer>()));
    }
}
