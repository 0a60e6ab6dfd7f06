//! Generated values
//!
//! Generators are resolved at run time from type descriptors, so the values they
//! produce are dynamically typed. `Value` plays the role `ChoiceValue` plays for
//! the choice sequence: a small closed set of shapes, with float-aware equality
//! and a canonical byte encoding used for fingerprinting argument tuples.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A single generated value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent optional value
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    /// Lists, sets, arrays and tuples
    List(Vec<Value>),
    /// Map entries in generation order
    Map(Vec<(Value, Value)>),
    /// A variant of a registered enum type
    Variant { type_name: String, name: String },
    /// A user-defined composite built from constructor parameters or fields
    Composite { type_name: String, fields: Vec<(String, Value)> },
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            // Bitwise, so NaN == NaN and -0.0 != 0.0
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (
                Value::Variant { type_name: ta, name: na },
                Value::Variant { type_name: tb, name: nb },
            ) => ta == tb && na == nb,
            (
                Value::Composite { type_name: ta, fields: fa },
                Value::Composite { type_name: tb, fields: fb },
            ) => ta == tb && fa == fb,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let mut bytes = Vec::new();
        self.encode(&mut bytes);
        bytes.hash(state);
    }
}

impl Value {
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Look up a named slot of a composite value
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Composite { fields, .. } => {
                fields.iter().find(|(field, _)| field == name).map(|(_, value)| value)
            }
            _ => None,
        }
    }

    /// Append the canonical encoding of this value to `out`.
    ///
    /// Every variant is tagged and every variable-length part is length-prefixed,
    /// so distinct values never share an encoding.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::Null => out.push(0),
            Value::Bool(b) => {
                out.push(1);
                out.push(*b as u8);
            }
            Value::Integer(i) => {
                out.push(2);
                let mut buf = [0u8; 16];
                BigEndian::write_i128(&mut buf, *i);
                out.extend_from_slice(&buf);
            }
            Value::Float(f) => {
                out.push(3);
                let mut buf = [0u8; 8];
                BigEndian::write_u64(&mut buf, f.to_bits());
                out.extend_from_slice(&buf);
            }
            Value::Char(c) => {
                out.push(4);
                let mut buf = [0u8; 4];
                BigEndian::write_u32(&mut buf, *c as u32);
                out.extend_from_slice(&buf);
            }
            Value::String(s) => {
                out.push(5);
                write_bytes(out, s.as_bytes());
            }
            Value::Bytes(b) => {
                out.push(6);
                write_bytes(out, b);
            }
            Value::List(items) => {
                out.push(7);
                write_len(out, items.len());
                for item in items {
                    item.encode(out);
                }
            }
            Value::Map(entries) => {
                out.push(8);
                write_len(out, entries.len());
                for (key, value) in entries {
                    key.encode(out);
                    value.encode(out);
                }
            }
            Value::Variant { type_name, name } => {
                out.push(9);
                write_bytes(out, type_name.as_bytes());
                write_bytes(out, name.as_bytes());
            }
            Value::Composite { type_name, fields } => {
                out.push(10);
                write_bytes(out, type_name.as_bytes());
                write_len(out, fields.len());
                for (field, value) in fields {
                    write_bytes(out, field.as_bytes());
                    value.encode(out);
                }
            }
        }
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, len as u64);
    out.extend_from_slice(&buf);
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

/// SHA-256 fingerprint of an argument tuple
pub fn fingerprint(values: &[Value]) -> [u8; 32] {
    let mut encoded = Vec::new();
    write_len(&mut encoded, values.len());
    for value in values {
        value.encode(&mut encoded);
    }
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hasher.finalize().into()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "{:?}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Variant { type_name, name } => write!(f, "{}::{}", type_name, name),
            Value::Composite { type_name, fields } => {
                write!(f, "{} {{ ", type_name)?;
                for (i, (field, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn test_fingerprint_distinguishes_nesting() {
        let flat = vec![Value::List(vec![]), Value::List(vec![])];
        let nested = vec![Value::List(vec![Value::List(vec![])])];
        assert_ne!(fingerprint(&flat), fingerprint(&nested));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let tuple = vec![Value::Integer(42), Value::String("abc".to_string())];
        assert_eq!(fingerprint(&tuple), fingerprint(&tuple.clone()));
    }

    #[test]
    fn test_display_composite() {
        let value = Value::Composite {
            type_name: "Point".to_string(),
            fields: vec![
                ("x".to_string(), Value::Integer(1)),
                ("y".to_string(), Value::Integer(-2)),
            ],
        };
        assert_eq!(value.to_string(), "Point { x: 1, y: -2 }");
        assert_eq!(value.field("y"), Some(&Value::Integer(-2)));
    }
}
