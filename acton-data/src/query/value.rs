//! Typed runtime values for entity fields
//!
//! Filters arrive as untyped JSON. Before a comparison is compiled the JSON
//! operand is coerced into a [`FieldValue`] of the field's declared
//! [`FieldType`], and from there into the concrete Rust type of the field via
//! [`FieldKind`].
//!
//! # Example
//!
//! ```rust
//! use acton_data::query::{FieldType, FieldValue, ValueKind};
//!
//! let ty = FieldType::required(ValueKind::Integer);
//! let value = FieldValue::coerce(&serde_json::json!("42"), ty).unwrap();
//! assert_eq!(value, FieldValue::Integer(42));
//! ```

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primitive kind of a field, independent of nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// `bool`
    Boolean,
    /// Signed or unsigned integers up to 64 bits
    Integer,
    /// `f64`
    Float,
    /// `String`
    String,
    /// `DateTime<Utc>`
    DateTime,
    /// `Uuid`
    Uuid,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::DateTime => write!(f, "datetime"),
            Self::Uuid => write!(f, "uuid"),
        }
    }
}

/// Declared type of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    /// Primitive kind
    pub kind: ValueKind,
    /// Whether the field accepts null (`Option<_>` fields)
    pub nullable: bool,
}

impl FieldType {
    /// A field that always holds a value
    #[must_use]
    pub const fn required(kind: ValueKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    /// An optional field
    #[must_use]
    pub const fn nullable(kind: ValueKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    /// Whether string-only operators apply to this field
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, ValueKind::String)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}?", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// A typed value read from, or written to, an entity field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// UUID value
    Uuid(Uuid),
    /// Timestamp value
    DateTime(DateTime<Utc>),
    /// String value
    String(String),
}

impl FieldValue {
    /// Whether this is [`FieldValue::Null`]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce an untyped JSON value into the declared type of a field
    ///
    /// Strings holding numbers, booleans, timestamps (RFC 3339 or
    /// `YYYY-MM-DD`) and UUIDs are parsed; scalars are rendered for string
    /// fields. Arrays and objects are never accepted.
    ///
    /// Returns a human-readable reason on failure.
    pub fn coerce(value: &serde_json::Value, ty: FieldType) -> Result<Self, String> {
        use serde_json::Value as Json;

        if value.is_null() {
            return if ty.nullable {
                Ok(Self::Null)
            } else {
                Err(format!("null is not a valid {}", ty))
            };
        }

        let rejected = || format!("{} is not a valid {}", value, ty.kind);

        match (ty.kind, value) {
            (_, Json::Array(_) | Json::Object(_)) => Err(rejected()),

            (ValueKind::Boolean, Json::Bool(b)) => Ok(Self::Boolean(*b)),
            (ValueKind::Boolean, Json::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(rejected()),
            },

            (ValueKind::Integer, Json::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                            Ok(Self::Integer(f as i64))
                        }
                        _ => Err(rejected()),
                    }
                }
            }
            (ValueKind::Integer, Json::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| rejected()),

            (ValueKind::Float, Json::Number(n)) => n.as_f64().map(Self::Float).ok_or_else(rejected),
            (ValueKind::Float, Json::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|_| rejected()),

            (ValueKind::String, Json::String(s)) => Ok(Self::String(s.clone())),
            (ValueKind::String, Json::Number(n)) => Ok(Self::String(n.to_string())),
            (ValueKind::String, Json::Bool(b)) => Ok(Self::String(b.to_string())),

            (ValueKind::DateTime, Json::String(s)) => parse_timestamp(s).ok_or_else(rejected),

            (ValueKind::Uuid, Json::String(s)) => Uuid::parse_str(s.trim())
                .map(Self::Uuid)
                .map_err(|_| rejected()),

            _ => Err(rejected()),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<FieldValue> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(FieldValue::DateTime(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| FieldValue::DateTime(naive.and_utc()))
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::DateTime(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::DateTime(ts)
    }
}

impl From<Uuid> for FieldValue {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl<V: Into<FieldValue>> From<Option<V>> for FieldValue {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A Rust type that can back an entity field
///
/// Implemented for the primitive field types and for `Option<V>` of any of
/// them. The methods are used by compiled accessors, so they run once per
/// record during filtering and ordering.
pub trait FieldKind: Clone + Send + Sync + 'static {
    /// Declared type reported for fields of this Rust type
    const TYPE: FieldType;

    /// Read the value out as a [`FieldValue`]
    fn to_value(&self) -> FieldValue;

    /// Convert a value already coerced to [`Self::TYPE`] back into `Self`
    fn from_value(value: FieldValue) -> Option<Self>;

    /// Total order used by sorting and by ordering comparisons
    fn compare(&self, other: &Self) -> Ordering;

    /// String view for substring operators
    fn text(&self) -> Option<&str> {
        None
    }

    /// Whether the value is absent
    fn is_null(&self) -> bool {
        false
    }
}

impl FieldKind for bool {
    const TYPE: FieldType = FieldType::required(ValueKind::Boolean);

    fn to_value(&self) -> FieldValue {
        FieldValue::Boolean(*self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

macro_rules! integer_field_kind {
    ($($ty:ty),*) => {
        $(
            impl FieldKind for $ty {
                const TYPE: FieldType = FieldType::required(ValueKind::Integer);

                fn to_value(&self) -> FieldValue {
                    FieldValue::Integer(i64::from(*self))
                }

                fn from_value(value: FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::Integer(n) => <$ty>::try_from(n).ok(),
                        _ => None,
                    }
                }

                fn compare(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

integer_field_kind!(i16, i32, i64, u16, u32);

/// Values above `i64::MAX` read as that bound; sorting still uses the full range
impl FieldKind for u64 {
    const TYPE: FieldType = FieldType::required(ValueKind::Integer);

    fn to_value(&self) -> FieldValue {
        FieldValue::Integer(i64::try_from(*self).unwrap_or(i64::MAX))
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Integer(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl FieldKind for f64 {
    const TYPE: FieldType = FieldType::required(ValueKind::Float);

    fn to_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(f) => Some(f),
            FieldValue::Integer(n) => Some(n as f64),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl FieldKind for String {
    const TYPE: FieldType = FieldType::required(ValueKind::String);

    fn to_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn text(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl FieldKind for DateTime<Utc> {
    const TYPE: FieldType = FieldType::required(ValueKind::DateTime);

    fn to_value(&self) -> FieldValue {
        FieldValue::DateTime(*self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::DateTime(ts) => Some(ts),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl FieldKind for Uuid {
    const TYPE: FieldType = FieldType::required(ValueKind::Uuid);

    fn to_value(&self) -> FieldValue {
        FieldValue::Uuid(*self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Uuid(u) => Some(u),
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl<V: FieldKind> FieldKind for Option<V> {
    const TYPE: FieldType = FieldType::nullable(V::TYPE.kind);

    fn to_value(&self) -> FieldValue {
        self.as_ref().map_or(FieldValue::Null, FieldKind::to_value)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => Some(None),
            other => V::from_value(other).map(Some),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.compare(b),
        }
    }

    fn text(&self) -> Option<&str> {
        self.as_ref().and_then(FieldKind::text)
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }
}
