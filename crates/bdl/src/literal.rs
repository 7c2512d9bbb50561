//! Literal values of the language.

use std::fmt;

use serde::Serialize;

/// A folded constant value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl Literal {
    /// Parse a value token as captured by the grammar.
    ///
    /// ```
    /// # use bdl::Literal;
    /// assert_eq!(Literal::parse("42"), Some(Literal::Integer(42)));
    /// assert_eq!(Literal::parse("1.5"), Some(Literal::Float(1.5)));
    /// assert_eq!(Literal::parse(r#""a\"b""#), Some(Literal::String("a\"b".into())));
    /// assert_eq!(Literal::parse("maybe"), None);
    /// ```
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "true" => return Some(Literal::Boolean(true)),
            "false" => return Some(Literal::Boolean(false)),
            _ => {}
        }
        if let Some(inner) = token
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            return Some(Literal::String(unescape(inner)));
        }
        if let Ok(value) = token.parse::<i64>() {
            return Some(Literal::Integer(value));
        }
        token.parse::<f64>().ok().map(Literal::Float)
    }

    /// Numeric view used by bound checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Integer(value) => Some(*value as f64),
            Literal::Float(value) => Some(*value),
            Literal::Boolean(_) | Literal::String(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Boolean(_) => "boolean",
            Literal::String(_) => "string",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Integer(value) => serde_json::Value::from(*value),
            Literal::Float(value) => serde_json::Value::from(*value),
            Literal::Boolean(value) => serde_json::Value::from(*value),
            Literal::String(value) => serde_json::Value::from(value.as_str()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value}"),
            Literal::Boolean(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "{value:?}"),
        }
    }
}

fn unescape(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some(other) => output.push(other),
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes() {
        assert_eq!(
            Literal::parse(r#""line\nnext\\""#),
            Some(Literal::String("line\nnext\\".to_string()))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Literal::Integer(-3).to_string(), "-3");
        assert_eq!(Literal::Float(2.5).to_string(), "2.5");
        assert_eq!(Literal::String("hi".into()).to_string(), "\"hi\"");
    }

    #[test]
    fn test_json() {
        assert_eq!(Literal::Integer(14).to_json(), serde_json::json!(14));
        assert_eq!(Literal::Boolean(true).to_json(), serde_json::json!(true));
        assert_eq!(serde_json::to_string(&Literal::String("x".into())).unwrap(), "\"x\"");
    }
}
