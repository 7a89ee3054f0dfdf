//! Typed structured fields.
//!
//! A record carries an ordered list of `(key, value)` pairs. Values are a
//! closed set of types so encoders can render each one precisely (durations
//! according to the active preset, timestamps as ISO-8601).

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A structured field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Duration(Duration),
    /// Rendered error message.
    Error(String),
    Time(DateTime<Utc>),
}

impl Value {
    /// Captures an error's display form.
    pub fn error(err: &(impl fmt::Display + ?Sized)) -> Self {
        Value::Error(err.to_string())
    }

    /// Returns the string payload of `Str` and `Error` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Error(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<Cow<'_, str>> for Value {
    fn from(v: Cow<'_, str>) -> Self {
        Value::Str(v.into_owned())
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::I64(v as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::U64(v as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F64(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

/// A named field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: Cow<'static, str>,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered field list. Duplicate keys are kept and emitted in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style append.
    pub fn with(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        self.push(Field::new(key, value));
        self
    }

    pub fn push(&mut self, field: Field) {
        self.0.push(field);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Field] {
        &self.0
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}

impl From<Vec<Field>> for Fields {
    fn from(fields: Vec<Field>) -> Self {
        Self(fields)
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Field> for Fields {
    fn extend<I: IntoIterator<Item = Field>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Fields {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Builds a [`Fields`] list from `key => value` pairs.
///
/// ```
/// let fields = reqlog::fields! { "status" => 200u16, "method" => "GET" };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $( fields.push($crate::Field::new($key, $value)); )+
        fields
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_preserves_order_and_duplicates() {
        let fields = crate::fields! { "a" => 1, "b" => "two", "a" => true };
        let keys: Vec<&str> = fields.iter().map(|f| &*f.key).collect();
        assert_eq!(keys, vec!["a", "b", "a"]);
        assert_eq!(fields.get("a"), Some(&Value::I64(1)));
    }

    #[test]
    fn conversions_pick_the_right_variant() {
        assert_eq!(Value::from(200u16), Value::U64(200));
        assert_eq!(Value::from(-3i32), Value::I64(-3));
        assert_eq!(Value::from("x"), Value::Str("x".into()));
        assert_eq!(
            Value::from(Duration::from_millis(5)),
            Value::Duration(Duration::from_millis(5))
        );
        let io = std::io::Error::other("boom");
        assert_eq!(Value::error(&io).as_str(), Some("boom"));
    }
}
