use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt::{self, Display};

/// Typed value of an INFO or FORMAT field.
///
/// Values the decoder can't classify against their declared type are kept as
/// [`FieldValue::Unrecognized`] holding the raw text, instead of being coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    /// Presence-only field (VCF `Type=Flag`).
    Flag,
    Text(String),
    /// `.` in the source.
    Missing,
    /// Comma separated list; only scalars are valid elements.
    Array(Vec<FieldValue>),
    Unrecognized(String),
}

impl FieldValue {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldValue::Array(_))
    }

    ///
    /// Check that the value can be persisted as-is: floats must be finite and
    /// arrays may only hold scalars.
    ///
    pub fn check_shape(&self) -> Result<(), String> {
        match self {
            FieldValue::Float(f) if !f.is_finite() => Err(format!("non-finite float {}", f)),
            FieldValue::Array(items) => {
                for item in items {
                    if !item.is_scalar() {
                        return Err("nested sequence inside a sequence value".to_string());
                    }
                    item.check_shape()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            FieldValue::Flag => serializer.serialize_bool(true),
            FieldValue::Text(s) | FieldValue::Unrecognized(s) => serializer.serialize_str(s),
            FieldValue::Missing => serializer.serialize_none(),
            FieldValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Flag => write!(f, "true"),
            FieldValue::Text(s) | FieldValue::Unrecognized(s) => write!(f, "{}", s),
            FieldValue::Missing => write!(f, "."),
            FieldValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}
