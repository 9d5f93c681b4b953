//! Statement parameter values as seen by the capture layer.
//!
//! Drivers hand parameters to the interceptor as a small value tree:
//! scalars, binary blobs, ordered sequences (positional parameters), and
//! ordered key-value mappings (named parameters). The tree is what the
//! redactor walks; it never travels on the wire itself — only its redacted
//! display projection does.

use std::fmt;

/// A parameter value bound to a statement.
///
/// Mapping entries preserve insertion order so the display projection is
/// stable.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// SQL NULL / absent value
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Signed integer scalar
    Int(i64),
    /// Unsigned integer scalar
    UInt(u64),
    /// Floating point scalar
    Float(f64),
    /// Text scalar
    Str(String),
    /// Binary blob — only its length is ever displayed
    Bytes(Vec<u8>),
    /// Ordered sequence (positional parameters, arrays)
    Seq(Vec<ParamValue>),
    /// Ordered key-value mapping (named parameters)
    Map(Vec<(String, ParamValue)>),
}

impl ParamValue {
    /// Text scalar from anything string-like.
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Positional parameter sequence.
    pub fn seq(values: impl IntoIterator<Item = ParamValue>) -> Self {
        Self::Seq(values.into_iter().collect())
    }

    /// Named parameter mapping, order-preserving.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ParamValue)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Whether this value is a scalar (not a sequence or mapping).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Seq(_) | Self::Map(_))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::UInt(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "<bytes:{}>", b.len()),
            Self::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalars() {
        assert_eq!(ParamValue::Null.to_string(), "NULL");
        assert_eq!(ParamValue::Bool(true).to_string(), "true");
        assert_eq!(ParamValue::Int(-7).to_string(), "-7");
        assert_eq!(ParamValue::str("abc").to_string(), "abc");
        assert_eq!(ParamValue::Bytes(vec![1, 2, 3]).to_string(), "<bytes:3>");
    }

    #[test]
    fn test_display_seq_and_map() {
        let seq = ParamValue::seq([ParamValue::Int(1), ParamValue::str("x")]);
        assert_eq!(seq.to_string(), "[1, x]");

        let map = ParamValue::map([("a", ParamValue::Int(1)), ("b", ParamValue::Null)]);
        assert_eq!(map.to_string(), "{a=1, b=NULL}");
    }

    #[test]
    fn test_map_preserves_order() {
        let map = ParamValue::map([
            ("z", ParamValue::Int(1)),
            ("a", ParamValue::Int(2)),
            ("m", ParamValue::Int(3)),
        ]);
        match map {
            ParamValue::Map(entries) => {
                let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["z", "a", "m"]);
            }
            _ => unreachable!(),
        }
    }
}
