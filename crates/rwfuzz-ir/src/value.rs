use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Signed integer widths. Plain `int` is held to 32-bit limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntKind {
    #[default]
    Int,
    I8,
    I16,
    I32,
    I64,
}

impl IntKind {
    /// Inclusive `(min, max)` for this width.
    pub fn bounds(self) -> (i64, i64) {
        match self {
            IntKind::Int | IntKind::I32 => (i32::MIN.into(), i32::MAX.into()),
            IntKind::I8 => (i8::MIN.into(), i8::MAX.into()),
            IntKind::I16 => (i16::MIN.into(), i16::MAX.into()),
            IntKind::I64 => (i64::MIN, i64::MAX),
        }
    }
}

/// Unsigned integer widths. Plain `uint` is held to the 32-bit maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UintKind {
    #[default]
    Uint,
    U8,
    U16,
    U32,
    U64,
}

impl UintKind {
    pub fn max(self) -> u64 {
        match self {
            UintKind::Uint | UintKind::U32 => u32::MAX.into(),
            UintKind::U8 => u8::MAX.into(),
            UintKind::U16 => u16::MAX.into(),
            UintKind::U64 => u64::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatKind {
    F32,
    #[default]
    F64,
}

impl FloatKind {
    /// Largest finite magnitude. The lower bound is its negation.
    pub fn max(self) -> f64 {
        match self {
            FloatKind::F32 => f32::MAX.into(),
            FloatKind::F64 => f64::MAX,
        }
    }
}

/// A contract argument or one node inside a structured argument.
///
/// Scalars carry their declared width so that mutation can respect the
/// parameter's range. Maps and lists nest arbitrarily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Value {
    Bool {
        value: bool,
    },
    Int {
        #[serde(default)]
        kind: IntKind,
        value: i64,
    },
    Uint {
        #[serde(default)]
        kind: UintKind,
        value: u64,
    },
    Float {
        #[serde(default)]
        kind: FloatKind,
        value: f64,
    },
    String {
        value: String,
    },
    Bytes {
        value: Vec<u8>,
    },
    Map {
        value: BTreeMap<String, Value>,
    },
    List {
        value: Vec<Value>,
    },
}

impl Value {
    pub fn bool(value: bool) -> Self {
        Value::Bool { value }
    }

    pub fn int(value: i64) -> Self {
        Value::Int {
            kind: IntKind::Int,
            value,
        }
    }

    pub fn uint(value: u64) -> Self {
        Value::Uint {
            kind: UintKind::Uint,
            value,
        }
    }

    pub fn float(value: f64) -> Self {
        Value::Float {
            kind: FloatKind::F64,
            value,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String {
            value: value.into(),
        }
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Value::Bytes {
            value: value.into(),
        }
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map {
            value: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List {
            value: items.into_iter().collect(),
        }
    }

    /// True for maps and lists.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Map { .. } | Value::List { .. })
    }

    /// Short type label for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool { .. } => "bool",
            Value::Int { .. } => "int",
            Value::Uint { .. } => "uint",
            Value::Float { .. } => "float",
            Value::String { .. } => "string",
            Value::Bytes { .. } => "bytes",
            Value::Map { .. } => "map",
            Value::List { .. } => "list",
        }
    }

    /// Untagged JSON form, as a contract would decode it.
    ///
    /// Nested byte strings become base64 text. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Bool { value } => Json::Bool(*value),
            Value::Int { value, .. } => Json::from(*value),
            Value::Uint { value, .. } => Json::from(*value),
            Value::Float { value, .. } => serde_json::Number::from_f64(*value)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String { value } => Json::String(value.clone()),
            Value::Bytes { value } => {
                Json::String(base64::engine::general_purpose::STANDARD.encode(value))
            }
            Value::Map { value } => Json::Object(
                value
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::List { value } => Json::Array(value.iter().map(Value::to_json).collect()),
        }
    }

    /// Equality of serialized forms for scalars, so `int 0` matches `uint 0`
    /// and an `i8` matches a plain `int` of the same value. Maps and lists
    /// compare structurally.
    pub fn same_serialized(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Map { .. } | Value::List { .. }, _)
            | (_, Value::Map { .. } | Value::List { .. }) => self == other,
            _ => self.to_json() == other.to_json(),
        }
    }

    /// Encode as the raw bytes of a key/value call argument.
    ///
    /// Strings and byte sequences are passed through untouched; everything
    /// else is sent as compact JSON.
    pub fn encode_arg(&self) -> Vec<u8> {
        match self {
            Value::String { value } => value.as_bytes().to_vec(),
            Value::Bytes { value } => value.clone(),
            other => other.to_json().to_string().into_bytes(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String { value } => write!(f, "{:?}", value),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bounds() {
        assert_eq!(IntKind::Int.bounds(), (i32::MIN as i64, i32::MAX as i64));
        assert_eq!(IntKind::I8.bounds(), (-128, 127));
        assert_eq!(IntKind::I64.bounds(), (i64::MIN, i64::MAX));
        assert_eq!(UintKind::Uint.max(), u32::MAX as u64);
        assert_eq!(UintKind::U64.max(), u64::MAX);
    }

    #[test]
    fn test_encode_arg_raw_for_text_and_bytes() {
        assert_eq!(Value::string("alice").encode_arg(), b"alice".to_vec());
        assert_eq!(Value::bytes(vec![0, 1, 255]).encode_arg(), vec![0, 1, 255]);
    }

    #[test]
    fn test_encode_arg_json_for_others() {
        assert_eq!(Value::int(-5).encode_arg(), b"-5".to_vec());
        assert_eq!(Value::bool(true).encode_arg(), b"true".to_vec());
        let nested = Value::map([
            ("amount", Value::uint(3)),
            ("tags", Value::list([Value::string("a")])),
        ]);
        assert_eq!(nested.encode_arg(), br#"{"amount":3,"tags":["a"]}"#.to_vec());
    }

    #[test]
    fn test_tagged_serde_form() {
        let v = Value::Int {
            kind: IntKind::I16,
            value: 7,
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, serde_json::json!({"type": "int", "kind": "i16", "value": 7}));

        let parsed: Value = serde_json::from_str(r#"{"type":"uint","value":9}"#).unwrap();
        assert_eq!(parsed, Value::uint(9));
    }

    #[test]
    fn test_nested_serde() {
        let v = Value::map([(
            "owner",
            Value::list([Value::string("x"), Value::bytes(vec![1, 2])]),
        )]);
        let text = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_same_serialized_scalars() {
        assert!(Value::int(0).same_serialized(&Value::uint(0)));
        let narrow = Value::Int {
            kind: IntKind::I8,
            value: 5,
        };
        assert!(narrow.same_serialized(&Value::int(5)));
        assert!(!Value::int(5).same_serialized(&Value::string("5")));
        assert!(!Value::int(1).same_serialized(&Value::bool(true)));
        assert!(!Value::int(0).same_serialized(&Value::int(1)));
    }

    #[test]
    fn test_same_serialized_containers_are_structural() {
        let a = Value::list([Value::int(1)]);
        let b = Value::list([Value::uint(1)]);
        assert!(a.same_serialized(&a.clone()));
        assert!(!a.same_serialized(&b));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::string("ab").to_string(), "\"ab\"");
        assert_eq!(Value::int(3).to_string(), "3");
        assert_eq!(Value::bytes(vec![104, 105]).to_string(), "\"aGk=\"");
    }
}
