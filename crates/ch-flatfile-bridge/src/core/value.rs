//! Row values and batches moved between connectors.

use std::fmt;

/// A single cell.
///
/// Database reads produce typed values; flat-file reads produce `Text`. Writers
/// serialize to their own native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer up to 64 bits.
    Int(i64),

    /// Unsigned integer up to 64 bits.
    UInt(u64),

    /// Floating point value.
    Float(f64),

    /// Text, and anything the bridge passes through as text
    /// (dates, decimals, UUIDs, wide integers).
    Text(String),
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render as a display string. NULL renders as an empty string.
    pub fn to_display(&self) -> String {
        self.to_string()
    }

    /// Convert a JSON cell from a ClickHouse `JSONCompact*` response.
    ///
    /// Arrays, maps and tuples are kept as their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// A row, in selection order.
pub type Row = Vec<Value>;

/// A bounded chunk of rows for streaming transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Rows in this batch, each in selection order.
    pub rows: Vec<Row>,

    /// 1-based position of this batch in the stream.
    pub sequence: usize,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(sequence: usize, rows: Vec<Row>) -> Self {
        Self { rows, sequence }
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_null_empty() {
        assert_eq!(Value::Null.to_display(), "");
        assert_eq!(Value::Int(-4).to_display(), "-4");
        assert_eq!(Value::Float(2.5).to_display(), "2.5");
        assert_eq!(Value::Bool(true).to_display(), "true");
        assert_eq!(Value::from("abc").to_display(), "abc");
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from_json(serde_json::json!(7)), Value::Int(7));
        assert_eq!(
            Value::from_json(serde_json::json!(u64::MAX)),
            Value::UInt(u64::MAX)
        );
        assert_eq!(Value::from_json(serde_json::json!(1.25)), Value::Float(1.25));
    }

    #[test]
    fn test_from_json_nested_kept_as_text() {
        let v = Value::from_json(serde_json::json!([1, 2]));
        assert_eq!(v, Value::Text("[1,2]".to_string()));
        assert!(Value::from_json(serde_json::Value::Null).is_null());
    }

    #[test]
    fn test_batch_operations() {
        let batch = Batch::new(
            3,
            vec![
                vec![Value::Int(1), Value::from("a")],
                vec![Value::Int(2), Value::from("b")],
            ],
        );
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert_eq!(batch.sequence, 3);
    }
}
