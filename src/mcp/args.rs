//! Lenient access to JSON argument objects.
//!
//! Tool handlers and the method router read loosely-typed client input.
//! [`Field`] keeps the difference between a key that is missing, one that is
//! explicitly `null`, and one that holds a value, while the `*_or` accessors
//! give handlers a default for anything absent or of the wrong type.

use serde_json::{Map, Value};

/// The state of a single key in a JSON object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// The key is not present (or the container is not an object).
    Missing,
    /// The key is present with an explicit `null`.
    Null,
    /// The key is present with a non-null value.
    Present(&'a Value),
}

impl<'a> Field<'a> {
    /// Returns the value if present and non-null.
    #[must_use]
    pub const fn value(self) -> Option<&'a Value> {
        match self {
            Self::Present(v) => Some(v),
            Self::Missing | Self::Null => None,
        }
    }

    /// Returns `true` if the key is absent.
    #[must_use]
    pub const fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Typed, defaulting accessors over a JSON object.
pub trait ArgsExt {
    /// Looks up `key`, distinguishing missing from `null`.
    fn field(&self, key: &str) -> Field<'_>;

    /// Returns `true` if the key is present, even when `null`.
    fn has_key(&self, key: &str) -> bool {
        !self.field(key).is_missing()
    }

    /// Returns the string value of `key`, if it is a string.
    fn get_str(&self, key: &str) -> Option<&str> {
        self.field(key).value().and_then(Value::as_str)
    }

    /// Returns the string value of `key`, or `default`.
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// Returns `key` as an integer, or `default`. Floats are truncated.
    #[allow(clippy::cast_possible_truncation)]
    fn i64_or(&self, key: &str, default: i64) -> i64 {
        self.field(key)
            .value()
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(default)
    }

    /// Returns `key` as a float, or `default`.
    fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.field(key)
            .value()
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    /// Returns `key` as a boolean, or `default`.
    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.field(key)
            .value()
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Returns `key` as an object, if it is one.
    fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.field(key).value().and_then(Value::as_object)
    }
}

impl ArgsExt for Map<String, Value> {
    fn field(&self, key: &str) -> Field<'_> {
        match self.get(key) {
            None => Field::Missing,
            Some(Value::Null) => Field::Null,
            Some(v) => Field::Present(v),
        }
    }
}

impl ArgsExt for Value {
    fn field(&self, key: &str) -> Field<'_> {
        self.as_object().map_or(Field::Missing, |obj| obj.field(key))
    }
}

/// Normalises a `tools/call` arguments value: `null`, absent, and
/// non-object arguments all become an empty object.
#[must_use]
pub fn normalise_arguments(arguments: Option<&Value>) -> Value {
    match arguments {
        Some(obj @ Value::Object(_)) => obj.clone(),
        _ => Value::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distinguishes_missing_null_and_present() {
        let args = json!({"a": null, "b": 3});
        assert_eq!(args.field("a"), Field::Null);
        assert_eq!(args.field("zzz"), Field::Missing);
        assert_eq!(args.field("b"), Field::Present(&json!(3)));
        assert!(args.has_key("a"));
        assert!(!args.has_key("zzz"));
    }

    #[test]
    fn wrong_types_fall_back_to_defaults() {
        let args = json!({"pin": "thirteen", "on": 1, "name": 5});
        assert_eq!(args.i64_or("pin", -1), -1);
        assert!(!args.bool_or("on", false));
        assert_eq!(args.str_or("name", "default"), "default");
    }

    #[test]
    fn numeric_coercions() {
        let args = json!({"a": 2.9, "b": 7});
        assert_eq!(args.i64_or("a", 0), 2);
        assert!((args.f64_or("b", 0.0) - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_object_container_is_all_missing() {
        let args = json!([1, 2, 3]);
        assert!(args.field("0").is_missing());
        assert_eq!(Value::Null.i64_or("x", 9), 9);
    }

    #[test]
    fn normalise_arguments_handles_null_and_absent() {
        assert_eq!(normalise_arguments(None), json!({}));
        assert_eq!(normalise_arguments(Some(&Value::Null)), json!({}));
        assert_eq!(normalise_arguments(Some(&json!("x"))), json!({}));
        assert_eq!(normalise_arguments(Some(&json!({"a": 1}))), json!({"a": 1}));
    }
}
