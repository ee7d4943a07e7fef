//! Conversion of row values into the JSON cells an insert sends.
//!
//! Flat files only produce text, so the target column's ClickHouse type
//! decides how each cell is encoded:
//!
//! | Base type | Encoding |
//! |-----------|----------|
//! | `Int8`..`Int64` | JSON integer |
//! | `UInt8`..`UInt64` | JSON unsigned integer |
//! | `Float32`, `Float64` | JSON number |
//! | `Bool` | JSON boolean (`true`/`false`/`1`/`0`) |
//! | anything else | JSON string, parsed by the server |
//!
//! `Nullable(...)` and `LowCardinality(...)` wrappers are stripped first; an
//! empty cell in a `Nullable` column becomes NULL.

use serde_json::{Number, Value as Json};

use crate::core::{ColumnDescriptor, Value};
use crate::error::{BridgeError, Result};

/// Native category of a ClickHouse type after unwrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Signed,
    Unsigned,
    Float,
    Bool,
    Text,
}

/// A target column with its parsed type.
#[derive(Debug, Clone)]
pub struct ColumnType {
    name: String,
    type_name: String,
    nullable: bool,
    kind: Kind,
}

impl ColumnType {
    pub fn from_descriptor(col: &ColumnDescriptor) -> Self {
        let (base, nullable) = unwrap_type(&col.data_type);
        let kind = match base {
            "Int8" | "Int16" | "Int32" | "Int64" => Kind::Signed,
            "UInt8" | "UInt16" | "UInt32" | "UInt64" => Kind::Unsigned,
            "Float32" | "Float64" => Kind::Float,
            "Bool" | "Boolean" => Kind::Bool,
            _ => Kind::Text,
        };
        Self {
            name: col.name.clone(),
            type_name: col.data_type.clone(),
            nullable,
            kind,
        }
    }

    /// Encode one cell for this column.
    pub fn encode(&self, value: &Value) -> Result<Json> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Text(s) => self.encode_text(s),
            Value::Bool(b) => match self.kind {
                Kind::Text => Ok(Json::String(b.to_string())),
                _ => Ok(Json::Bool(*b)),
            },
            Value::Int(i) => match self.kind {
                Kind::Text => Ok(Json::String(i.to_string())),
                _ => Ok(Json::from(*i)),
            },
            Value::UInt(u) => match self.kind {
                Kind::Text => Ok(Json::String(u.to_string())),
                _ => Ok(Json::from(*u)),
            },
            Value::Float(f) => match (self.kind, Number::from_f64(*f)) {
                (Kind::Text, _) | (_, None) => Ok(Json::String(f.to_string())),
                (_, Some(n)) => Ok(Json::Number(n)),
            },
        }
    }

    fn encode_text(&self, s: &str) -> Result<Json> {
        let trimmed = s.trim();
        if self.nullable && trimmed.is_empty() {
            return Ok(Json::Null);
        }

        match self.kind {
            Kind::Text => Ok(Json::String(s.to_string())),
            Kind::Signed => trimmed
                .parse::<i64>()
                .map(Json::from)
                .map_err(|_| self.conversion_error(s)),
            Kind::Unsigned => trimmed
                .parse::<u64>()
                .map(Json::from)
                .map_err(|_| self.conversion_error(s)),
            Kind::Float => {
                let f = trimmed
                    .parse::<f64>()
                    .map_err(|_| self.conversion_error(s))?;
                // nan/inf have no JSON number form; the server parses the text.
                Ok(Number::from_f64(f)
                    .map(Json::Number)
                    .unwrap_or_else(|| Json::String(trimmed.to_string())))
            }
            Kind::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Json::Bool(true)),
                "false" | "0" => Ok(Json::Bool(false)),
                _ => Err(self.conversion_error(s)),
            },
        }
    }

    fn conversion_error(&self, value: &str) -> BridgeError {
        BridgeError::conversion(&self.name, value, &self.type_name)
    }
}

/// Strip `Nullable(...)` and `LowCardinality(...)` wrappers.
///
/// Returns the base type and whether any layer was `Nullable`.
pub fn unwrap_type(data_type: &str) -> (&str, bool) {
    let mut current = data_type.trim();
    let mut nullable = false;
    loop {
        if let Some(inner) = strip_wrapper(current, "Nullable") {
            nullable = true;
            current = inner;
        } else if let Some(inner) = strip_wrapper(current, "LowCardinality") {
            current = inner;
        } else {
            return (current, nullable);
        }
    }
}

fn strip_wrapper<'a>(t: &'a str, wrapper: &str) -> Option<&'a str> {
    t.strip_prefix(wrapper)?
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

/// Encode one row as a `JSONCompactEachRow` line (without the newline).
pub fn encode_row(row: &[Value], columns: &[ColumnType]) -> Result<String> {
    let cells = row
        .iter()
        .zip(columns)
        .map(|(value, col)| col.encode(value))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json::Array(cells).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(t: &str) -> ColumnType {
        ColumnType::from_descriptor(&ColumnDescriptor::new("c", t))
    }

    #[test]
    fn test_unwrap_type() {
        assert_eq!(unwrap_type("Int64"), ("Int64", false));
        assert_eq!(unwrap_type("Nullable(Int64)"), ("Int64", true));
        assert_eq!(
            unwrap_type("LowCardinality(Nullable(String))"),
            ("String", true)
        );
        assert_eq!(unwrap_type("Array(Int32)"), ("Array(Int32)", false));
    }

    #[test]
    fn test_encode_integers() {
        assert_eq!(col("Int32").encode(&Value::from("-12")).unwrap(), Json::from(-12));
        assert_eq!(col("UInt64").encode(&Value::from(" 7 ")).unwrap(), Json::from(7u64));
        assert!(col("UInt8").encode(&Value::from("-1")).is_err());
    }

    #[test]
    fn test_encode_float_and_bool() {
        assert_eq!(col("Float64").encode(&Value::from("2.5")).unwrap(), Json::from(2.5));
        assert_eq!(
            col("Float64").encode(&Value::from("nan")).unwrap(),
            Json::String("nan".to_string())
        );
        assert_eq!(col("Bool").encode(&Value::from("TRUE")).unwrap(), Json::Bool(true));
        assert_eq!(col("Bool").encode(&Value::from("0")).unwrap(), Json::Bool(false));
        assert!(col("Bool").encode(&Value::from("maybe")).is_err());
    }

    #[test]
    fn test_empty_cell_into_nullable_is_null() {
        assert_eq!(col("Nullable(Int64)").encode(&Value::from("")).unwrap(), Json::Null);
        assert!(col("Int64").encode(&Value::from("")).is_err());
        assert_eq!(
            col("String").encode(&Value::from("")).unwrap(),
            Json::String(String::new())
        );
    }

    #[test]
    fn test_conversion_error_names_column_and_type() {
        let c = ColumnType::from_descriptor(&ColumnDescriptor::new("age", "Nullable(Int64)"));
        let err = c.encode(&Value::from("abc")).unwrap_err();
        match err {
            BridgeError::Conversion {
                column,
                value,
                target_type,
            } => {
                assert_eq!(column, "age");
                assert_eq!(value, "abc");
                assert_eq!(target_type, "Nullable(Int64)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_types_pass_through() {
        assert_eq!(
            col("DateTime").encode(&Value::from("2024-01-02 03:04:05")).unwrap(),
            Json::String("2024-01-02 03:04:05".to_string())
        );
        assert_eq!(
            col("String").encode(&Value::Int(5)).unwrap(),
            Json::String("5".to_string())
        );
    }

    #[test]
    fn test_encode_row() {
        let cols = vec![col("Int64"), col("String")];
        let line = encode_row(&[Value::from("1"), Value::from("a\"b")], &cols).unwrap();
        assert_eq!(line, r#"[1,"a\"b"]"#);
    }
}
