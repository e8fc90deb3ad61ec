//! Result shape projection.
//!
//! An [`Expect`] names one field of a call result (or the whole result when
//! the key is empty) together with a default. If the field is absent or does
//! not have the expected shape, the default is returned instead. A mismatch
//! is never reported as an error.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Runtime kind of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    /// Kind of the given value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Bool,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }
}

type ShapeFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Clone)]
enum Shape {
    Kind(JsonKind),
    Decode(ShapeFn),
}

/// Expected result shape with a fallback value.
#[derive(Clone)]
pub struct Expect {
    key: String,
    shape: Shape,
    default: Value,
}

impl Expect {
    /// Accept any value of the same JSON kind as `default`.
    pub fn kind(key: impl Into<String>, default: Value) -> Self {
        Self {
            key: key.into(),
            shape: Shape::Kind(JsonKind::of(&default)),
            default,
        }
    }

    /// Accept any value that deserializes into `T`.
    pub fn typed<T>(key: impl Into<String>, default: T) -> Self
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        Self {
            key: key.into(),
            shape: Shape::Decode(Arc::new(|value: &Value| {
                serde_json::from_value::<T>(value.clone()).is_ok()
            })),
            default: serde_json::to_value(default).unwrap_or(Value::Null),
        }
    }

    /// The projected field name. Empty means the whole result.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The fallback value.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    fn accepts(&self, value: &Value) -> bool {
        match &self.shape {
            Shape::Kind(kind) => JsonKind::of(value) == *kind,
            Shape::Decode(check) => check(value),
        }
    }

    /// Project `result` onto the expected shape.
    pub fn project(&self, result: Value) -> Value {
        let value = if self.key.is_empty() {
            result
        } else {
            match result {
                Value::Object(mut fields) => fields.remove(&self.key).unwrap_or(Value::Null),
                _ => Value::Null,
            }
        };

        if value.is_null() || !self.accepts(&value) {
            return self.default.clone();
        }

        value
    }
}

impl fmt::Debug for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &self.shape {
            Shape::Kind(kind) => format!("{:?}", kind),
            Shape::Decode(_) => "Decode".to_string(),
        };
        f.debug_struct("Expect")
            .field("key", &self.key)
            .field("shape", &shape)
            .field("default", &self.default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Foo {
        foo: i64,
    }

    #[test]
    fn test_typed_substitutes_on_decode_failure() {
        let expect = Expect::typed("", Foo { foo: 1 });
        assert_eq!(expect.project(json!({"foo": "bad"})), json!({"foo": 1}));
        assert_eq!(expect.project(json!({"foo": 42})), json!({"foo": 42}));
    }

    #[test]
    fn test_kind_descends_into_key() {
        let expect = Expect::kind("results", json!([]));
        assert_eq!(
            expect.project(json!({"results": [1, 2]})),
            json!([1, 2])
        );
        assert_eq!(expect.project(json!({"results": "x"})), json!([]));
        assert_eq!(expect.project(json!({"other": [1]})), json!([]));
        assert_eq!(expect.project(json!(7)), json!([]));
    }

    #[test]
    fn test_kind_is_shallow() {
        let expect = Expect::kind("", json!({"foo": 1}));
        assert_eq!(
            expect.project(json!({"foo": "bad"})),
            json!({"foo": "bad"})
        );
    }

    #[test]
    fn test_null_always_falls_back() {
        let expect = Expect::kind("", Value::Null);
        assert_eq!(expect.project(Value::Null), Value::Null);

        let expect = Expect::kind("code", json!(0));
        assert_eq!(expect.project(json!({"code": null})), json!(0));
    }
}
