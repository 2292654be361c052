//! Token tree types.
//!
//! A token tree is an untyped JSON-like document. Every token remembers the
//! path it was found at (`states.S0.on_event.E`, `states.S0.start_timers[1]`)
//! and, when it came from source text, its line and column.

use serde_json::Value;
use std::fmt;

/// Source position of a token. Both fields are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line: {}, pos: {}", self.line, self.column)
    }
}

/// Coarse type of a token, used in type mismatch messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Null => write!(f, "Null"),
            TokenType::Boolean => write!(f, "Boolean"),
            TokenType::Number => write!(f, "Number"),
            TokenType::String => write!(f, "String"),
            TokenType::Array => write!(f, "Array"),
            TokenType::Object => write!(f, "Object"),
        }
    }
}

/// Payload of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Token>),
    /// Object members in declaration order.
    Object(Vec<Member>),
}

/// A key/value pair of an object token.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub key: String,
    pub key_span: Option<Span>,
    pub value: Token,
}

/// A node of the token tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: TokenValue,
    pub path: String,
    pub span: Option<Span>,
}

impl Token {
    pub fn new(value: TokenValue, path: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            value,
            path: path.into(),
            span,
        }
    }

    /// Builds a token tree from parsed JSON. Tokens carry paths but no spans.
    pub fn from_value(value: &Value) -> Self {
        Self::from_value_at(value, String::new())
    }

    fn from_value_at(value: &Value, path: String) -> Self {
        let value = match value {
            Value::Null => TokenValue::Null,
            Value::Bool(b) => TokenValue::Bool(*b),
            Value::Number(n) => TokenValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => TokenValue::String(s.clone()),
            Value::Array(items) => TokenValue::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Self::from_value_at(item, index_path(&path, i)))
                    .collect(),
            ),
            Value::Object(map) => TokenValue::Object(
                map.iter()
                    .map(|(key, item)| Member {
                        key: key.clone(),
                        key_span: None,
                        value: Self::from_value_at(item, child_path(&path, key)),
                    })
                    .collect(),
            ),
        };
        Self {
            value,
            path,
            span: None,
        }
    }

    pub fn token_type(&self) -> TokenType {
        match &self.value {
            TokenValue::Null => TokenType::Null,
            TokenValue::Bool(_) => TokenType::Boolean,
            TokenValue::Number(_) => TokenType::Number,
            TokenValue::String(_) => TokenType::String,
            TokenValue::Array(_) => TokenType::Array,
            TokenValue::Object(_) => TokenType::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, TokenValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            TokenValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            TokenValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            TokenValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Token]> {
        match &self.value {
            TokenValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[Member]> {
        match &self.value {
            TokenValue::Object(members) => Some(members),
            _ => None,
        }
    }

    /// Looks up an object member by key.
    pub fn get(&self, key: &str) -> Option<&Token> {
        self.as_object()?
            .iter()
            .find(|m| m.key == key)
            .map(|m| &m.value)
    }
}

/// Path of the member `key` under `parent`.
pub fn child_path(parent: &str, key: &str) -> String {
    let plain = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    match (parent.is_empty(), plain) {
        (true, true) => key.to_string(),
        (false, true) => format!("{}.{}", parent, key),
        (_, false) => format!("{}['{}']", parent, key.replace('\'', "\\'")),
    }
}

/// Path of the element `index` under `parent`.
pub fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paths() {
        assert_eq!(child_path("", "states"), "states");
        assert_eq!(child_path("states", "S0"), "states.S0");
        assert_eq!(
            child_path("states", "waiting room"),
            "states['waiting room']"
        );
        assert_eq!(child_path("", "a.b"), "['a.b']");
        assert_eq!(
            index_path("states.S0.start_timers", 1),
            "states.S0.start_timers[1]"
        );
    }

    #[test]
    fn test_from_value_paths() {
        let token = Token::from_value(&json!({
            "states": {"S0": {"start_timers": ["T1", "T2"]}},
            "start_state": "S0"
        }));

        let timers = token
            .get("states")
            .and_then(|s| s.get("S0"))
            .and_then(|s| s.get("start_timers"))
            .unwrap();
        assert_eq!(timers.path, "states.S0.start_timers");
        assert_eq!(
            timers.as_array().unwrap()[1].path,
            "states.S0.start_timers[1]"
        );
        assert!(timers.span.is_none());

        assert_eq!(token.get("start_state").unwrap().as_str(), Some("S0"));
        assert_eq!(token.path, "");
    }

    #[test]
    fn test_from_value_preserves_member_order() {
        let token = Token::from_value(&json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let keys: Vec<&str> = token
            .as_object()
            .unwrap()
            .iter()
            .map(|m| m.key.as_str())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_accessors() {
        let token = Token::from_value(&json!({"n": 2.5, "b": false, "z": null}));
        assert_eq!(token.get("n").unwrap().as_f64(), Some(2.5));
        assert_eq!(token.get("b").unwrap().as_bool(), Some(false));
        assert!(token.get("z").unwrap().is_null());
        assert_eq!(token.get("n").unwrap().token_type(), TokenType::Number);
        assert!(token.get("missing").is_none());
        assert!(token.get("n").unwrap().get("x").is_none());
    }

    #[test]
    fn test_token_type_display() {
        assert_eq!(TokenType::Boolean.to_string(), "Boolean");
        assert_eq!(TokenType::Object.to_string(), "Object");
    }
}
