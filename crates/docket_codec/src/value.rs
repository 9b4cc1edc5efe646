//! Dynamic document value type.

use crate::decimal::Decimal128;

/// A dynamic document value.
///
/// This is the tagged union over every value kind Docket can index. It mirrors
/// the BSON value space (the host document format) but is owned by the caller
/// and independent of any particular wire representation.
///
/// `Undefined` is the "path absent" sentinel used by multi-key term
/// generation: when a correlated sibling path is missing in one array element,
/// the generated composite row carries `Undefined` in that slot rather than
/// omitting the row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Sentinel ordered below every other value.
    MinKey,
    /// Missing/undefined slot; ordered between `MinKey` and `Null`.
    Undefined,
    /// Null value.
    Null,
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// IEEE 754 double.
    Double(f64),
    /// IEEE 754-2008 decimal128.
    Decimal128(Decimal128),
    /// UTF-8 string.
    String(String),
    /// Nested document: ordered field list.
    Document(Vec<(String, Value)>),
    /// Array of values.
    Array(Vec<Value>),
    /// Binary blob with a subtype byte.
    Binary {
        /// Binary subtype tag.
        subtype: u8,
        /// Raw bytes.
        bytes: Vec<u8>,
    },
    /// 12-byte object id.
    ObjectId([u8; 12]),
    /// Boolean value.
    Bool(bool),
    /// Date as milliseconds since the Unix epoch.
    Date(i64),
    /// Internal timestamp: seconds plus an increment.
    Timestamp {
        /// Seconds since the Unix epoch.
        time: u32,
        /// Ordinal within the second.
        increment: u32,
    },
    /// Regular expression: pattern and option flags.
    Regex {
        /// The regex pattern.
        pattern: String,
        /// The option flags, e.g. `"i"`.
        options: String,
    },
    /// Sentinel ordered above every other value.
    MaxKey,
}

impl Value {
    /// Whether this value is the null literal.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is the missing/undefined sentinel.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether this value is numeric (any width).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_)
        )
    }

    /// Get this value as an `i64`, if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a document field list, if it is a document.
    pub fn as_document(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Document(fields) => Some(fields),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a field in this document value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Document(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// A short name for the value kind, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::MinKey => "minKey",
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Int32(_) => "int",
            Value::Int64(_) => "long",
            Value::Double(_) => "double",
            Value::Decimal128(_) => "decimal",
            Value::String(_) => "string",
            Value::Document(_) => "object",
            Value::Array(_) => "array",
            Value::Binary { .. } => "binData",
            Value::ObjectId(_) => "objectId",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Timestamp { .. } => "timestamp",
            Value::Regex { .. } => "regex",
            Value::MaxKey => "maxKey",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Build a document value from field pairs, e.g.
/// `doc(vec![("a", Value::from(1))])`.
pub fn doc(fields: Vec<(&str, Value)>) -> Value {
    Value::Document(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::Undefined.is_undefined());
        assert!(Value::Int32(1).is_numeric());
        assert!(Value::Double(1.5).is_numeric());
        assert!(!Value::Bool(true).is_numeric());

        assert_eq!(Value::Int32(7).as_i64(), Some(7));
        assert_eq!(Value::Int64(7).as_i64(), Some(7));
        assert_eq!(Value::Double(7.0).as_i64(), None);

        assert_eq!(Value::from("hi").as_str(), Some("hi"));
    }

    #[test]
    fn document_get() {
        let d = doc(vec![("name", Value::from("ada")), ("age", Value::from(36))]);
        assert_eq!(d.get("name"), Some(&Value::from("ada")));
        assert_eq!(d.get("age"), Some(&Value::Int32(36)));
        assert_eq!(d.get("missing"), None);
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int32(42));
        assert_eq!(Value::from(42i64), Value::Int64(42));
        assert_eq!(Value::from(vec![1i32, 2]), {
            Value::Array(vec![Value::Int32(1), Value::Int32(2)])
        });
    }

    #[test]
    fn negative_zero_equals_zero() {
        // Derived f64 equality already treats -0.0 == 0.0.
        assert_eq!(Value::Double(-0.0), Value::Double(0.0));
    }
}
