use std::collections::HashMap;
use std::fmt::Write as _;

/// A node in the context tree handed to a render.
///
/// Absence is not stored; lookups yield `Option<&Value>` and `None` renders
/// as empty output. The tree must not be mutated while a render borrows it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Seq(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Key lookup; `None` for missing keys and non-map nodes.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Append the rendered form: strings raw, integers in decimal, floats as
    /// the shortest round-tripping decimal, booleans as `true`/`false`,
    /// containers in their debug form.
    pub fn render_to(&self, out: &mut String) {
        match self {
            Value::Str(s) => out.push_str(s),
            other => {
                let _ = write!(out, "{other}");
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Seq(items) => write!(f, "{items:?}"),
            Value::Map(entries) => write!(f, "{entries:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Bridge for JSON context files. Numbers become `Int` when integral,
/// `Float` otherwise; `null` renders as nothing, so it maps to the empty
/// string.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Str(String::new()),
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(value: &Value) -> String {
        let mut out = String::new();
        value.render_to(&mut out);
        out
    }

    #[test]
    fn render_scalars() {
        assert_eq!(rendered(&Value::from("plain")), "plain");
        assert_eq!(rendered(&Value::from(42i64)), "42");
        assert_eq!(rendered(&Value::from(-7i64)), "-7");
        assert_eq!(rendered(&Value::from(true)), "true");
        assert_eq!(rendered(&Value::from(false)), "false");
    }

    #[test]
    fn render_floats_shortest_form() {
        assert_eq!(rendered(&Value::from(1.5)), "1.5");
        assert_eq!(rendered(&Value::from(1.0)), "1");
        assert_eq!(rendered(&Value::from(0.1)), "0.1");
    }

    #[test]
    fn get_on_non_map_is_none() {
        assert_eq!(Value::from("s").get("key"), None);
        assert_eq!(Value::from(vec![1i64]).get("key"), None);
    }

    #[test]
    fn map_lookup() {
        let ctx: Value = [("name", Value::from("World"))].into_iter().collect();
        assert_eq!(ctx.get("name"), Some(&Value::from("World")));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn from_json_numbers() {
        let v = Value::from(serde_json::json!({"a": 3, "b": 2.5, "c": null}));
        assert_eq!(v.get("a"), Some(&Value::Int(3)));
        assert_eq!(v.get("b"), Some(&Value::Float(2.5)));
        assert_eq!(v.get("c"), Some(&Value::Str(String::new())));
    }

    #[test]
    fn from_json_nested() {
        let v = Value::from(serde_json::json!({
            "users": [{"name": "Alice"}, {"name": "Bob"}]
        }));
        let users = v.get("users").and_then(Value::as_seq).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].get("name"), Some(&Value::from("Bob")));
    }
}
