//! Addressing of leaf scalars inside structured call inputs.
//!
//! A [`ValuePath`] starts at a parameter name and descends through map
//! fields and list indices. On disk it is a list of strings, with list
//! indices written as `"[i]"`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::FunctionInput;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathToken {
    Field(String),
    Index(usize),
}

impl PathToken {
    /// Parse one serialized token. Anything that is not a bracketed
    /// decimal index is a field name.
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|digits| digits.parse::<usize>().ok())
            .map(PathToken::Index)
            .unwrap_or_else(|| PathToken::Field(raw.to_string()))
    }
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Field(name) => write!(f, "{}", name),
            PathToken::Index(i) => write!(f, "[{}]", i),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ValuePath(Vec<PathToken>);

impl ValuePath {
    pub fn new(tokens: Vec<PathToken>) -> Self {
        Self(tokens)
    }

    /// Path to a top-level parameter.
    pub fn param(name: impl Into<String>) -> Self {
        Self(vec![PathToken::Field(name.into())])
    }

    pub fn tokens(&self) -> &[PathToken] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path one level deeper.
    pub fn child(&self, token: PathToken) -> Self {
        let mut tokens = self.0.clone();
        tokens.push(token);
        Self(tokens)
    }

    /// Every leaf path of `input`, in parameter-name order.
    ///
    /// Empty maps and lists contribute no paths.
    pub fn leaves(input: &FunctionInput) -> Vec<ValuePath> {
        let mut out = Vec::new();
        for (name, value) in input {
            collect(value, ValuePath::param(name.clone()), &mut out);
        }
        out
    }

    /// The value this path addresses, if the input has that shape.
    pub fn resolve<'a>(&self, input: &'a FunctionInput) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let PathToken::Field(name) = first else {
            return None;
        };
        let mut node = input.get(name)?;
        for token in rest {
            node = match (token, node) {
                (PathToken::Field(key), Value::Map { value }) => value.get(key)?,
                (PathToken::Index(i), Value::List { value }) => value.get(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn resolve_mut<'a>(&self, input: &'a mut FunctionInput) -> Option<&'a mut Value> {
        let (first, rest) = self.0.split_first()?;
        let PathToken::Field(name) = first else {
            return None;
        };
        let mut node = input.get_mut(name)?;
        for token in rest {
            node = match (token, node) {
                (PathToken::Field(key), Value::Map { value }) => value.get_mut(key)?,
                (PathToken::Index(i), Value::List { value }) => value.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

fn collect(value: &Value, at: ValuePath, out: &mut Vec<ValuePath>) {
    match value {
        Value::Map { value } => {
            for (key, child) in value {
                collect(child, at.child(PathToken::Field(key.clone())), out);
            }
        }
        Value::List { value } => {
            for (i, child) in value.iter().enumerate() {
                collect(child, at.child(PathToken::Index(i)), out);
            }
        }
        _ => out.push(at),
    }
}

impl From<Vec<String>> for ValuePath {
    fn from(raw: Vec<String>) -> Self {
        Self(raw.iter().map(|s| PathToken::parse(s)).collect())
    }
}

impl From<ValuePath> for Vec<String> {
    fn from(path: ValuePath) -> Self {
        path.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            match token {
                PathToken::Field(name) if i > 0 => write!(f, ".{}", name)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> FunctionInput {
        let mut input = FunctionInput::new();
        input.insert("amount".into(), Value::uint(10));
        input.insert(
            "order".into(),
            Value::map([
                ("id", Value::string("o-1")),
                ("items", Value::list([Value::int(1), Value::int(2)])),
            ]),
        );
        input
    }

    #[test]
    fn test_token_parse() {
        assert_eq!(PathToken::parse("[3]"), PathToken::Index(3));
        assert_eq!(PathToken::parse("name"), PathToken::Field("name".into()));
        assert_eq!(PathToken::parse("[x]"), PathToken::Field("[x]".into()));
    }

    #[test]
    fn test_leaves_cover_every_scalar() {
        let paths = ValuePath::leaves(&sample_input());
        let rendered: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["amount", "order.id", "order.items[0]", "order.items[1]"]
        );
    }

    #[test]
    fn test_resolve_and_mutate() {
        let mut input = sample_input();
        let path = ValuePath::from(vec!["order".to_string(), "items".into(), "[1]".into()]);
        assert_eq!(path.resolve(&input), Some(&Value::int(2)));

        *path.resolve_mut(&mut input).unwrap() = Value::int(9);
        assert_eq!(path.resolve(&input), Some(&Value::int(9)));
    }

    #[test]
    fn test_resolve_shape_mismatch() {
        let input = sample_input();
        let path = ValuePath::from(vec!["amount".to_string(), "[0]".into()]);
        assert!(path.resolve(&input).is_none());
        let missing = ValuePath::param("nope");
        assert!(missing.resolve(&input).is_none());
    }

    #[test]
    fn test_serde_as_string_list() {
        let path = ValuePath::from(vec!["order".to_string(), "items".into(), "[0]".into()]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["order","items","[0]"]"#);
        let back: ValuePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
