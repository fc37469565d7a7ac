//! Shared test entity

use chrono::{DateTime, Utc};

use crate::accessor::{Describe, SchemaBuilder};
use crate::repository::Entity;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Person {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub email: Option<String>,
    pub is_deleted: bool,
    pub deleted_date: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl Person {
    pub fn new(name: &str, age: i32) -> Self {
        Self {
            name: name.to_string(),
            age,
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

impl Describe for Person {
    const NAME: &'static str = "Person";

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("id", |p: &Person| &p.id, |p: &mut Person| &mut p.id)
            .field("name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
            .field("age", |p: &Person| &p.age, |p: &mut Person| &mut p.age)
            .field("email", |p: &Person| &p.email, |p: &mut Person| &mut p.email)
            .field(
                "is_deleted",
                |p: &Person| &p.is_deleted,
                |p: &mut Person| &mut p.is_deleted,
            )
            .field(
                "deleted_date",
                |p: &Person| &p.deleted_date,
                |p: &mut Person| &mut p.deleted_date,
            )
            .field(
                "deleted_by",
                |p: &Person| &p.deleted_by,
                |p: &mut Person| &mut p.deleted_by,
            );
    }
}

impl Entity for Person {
    type Id = i64;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// Alice (30), Bob (25) and Charlie (42, no email)
pub(crate) fn people() -> Vec<Person> {
    vec![
        Person::new("Alice", 30).with_email("alice@example.com"),
        Person::new("Bob", 25).with_email("bob@example.com"),
        Person::new("Charlie", 42),
    ]
}
