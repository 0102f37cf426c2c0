use std::fmt;

/// What a function leaves behind in the script text.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Text(String),
    Integer(i64),
    Bool(bool),
    List(Vec<String>),
    Json(serde_json::Value),
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Null => Ok(()),
            ScriptValue::Text(text) => f.write_str(text),
            ScriptValue::Integer(n) => write!(f, "{}", n),
            ScriptValue::Bool(b) => write!(f, "{}", b),
            ScriptValue::List(items) => f.write_str(&items.join(", ")),
            ScriptValue::Json(value) => write!(f, "{}", value),
        }
    }
}

impl From<String> for ScriptValue {
    fn from(text: String) -> Self {
        ScriptValue::Text(text)
    }
}

impl From<&str> for ScriptValue {
    fn from(text: &str) -> Self {
        ScriptValue::Text(text.to_string())
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(n: i64) -> Self {
        ScriptValue::Integer(n)
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        ScriptValue::Json(value)
    }
}

impl<T: Into<ScriptValue>> From<Option<T>> for ScriptValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ScriptValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering() {
        assert_eq!(ScriptValue::Null.to_string(), "");
        assert_eq!(ScriptValue::from(Some(50_i64)).to_string(), "50");
        assert_eq!(ScriptValue::from(None::<bool>), ScriptValue::Null);
        assert_eq!(
            ScriptValue::List(vec!["a".into(), "b".into()]).to_string(),
            "a, b"
        );
        assert_eq!(
            ScriptValue::from(serde_json::json!({ "speed": 1.2 })).to_string(),
            r#"{"speed":1.2}"#
        );
    }
}
