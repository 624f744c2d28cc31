//! Row and scalar value types produced by aggregate queries

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{StatsError, StatsResult};

/// A single result row. Rows carry no identity beyond their position.
pub type Row = Vec<Scalar>;

/// Supported cell value types
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// SQL NULL / JSON null
    Null,

    Bool(bool),

    /// 64-bit signed integer (covers int2/int4/int8 columns)
    Integer(i64),

    /// 64-bit floating point number
    Float(f64),

    /// Arbitrary-precision decimal (`numeric` columns)
    Decimal(Decimal),

    Text(String),

    /// Timestamp carrying a UTC offset (`timestamptz` columns)
    Timestamp(DateTime<FixedOffset>),

    /// Timestamp without zone (`timestamp` columns)
    NaiveTimestamp(NaiveDateTime),

    /// Elapsed time (`interval` columns)
    Duration(TimeDelta),

    /// A column type the row model has no representation for.
    /// Kept so the serializer can reject it instead of the store dropping it.
    Unsupported { type_name: String },
}

impl Scalar {
    /// Short name of the value kind, used in error messages
    pub fn kind(&self) -> &str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Integer(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Decimal(_) => "decimal",
            Scalar::Text(_) => "text",
            Scalar::Timestamp(_) => "timestamp",
            Scalar::NaiveTimestamp(_) => "naive timestamp",
            Scalar::Duration(_) => "duration",
            Scalar::Unsupported { type_name } => type_name,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Convert a JSON leaf value into a scalar.
    ///
    /// Arrays and objects have no scalar form and are rejected.
    pub fn from_json(value: &Value) -> StatsResult<Self> {
        match value {
            Value::Null => Ok(Scalar::Null),
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Scalar::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Scalar::Float(f))
                } else {
                    Err(StatsError::malformed(format!("unrepresentable number {}", n)))
                }
            }
            Value::String(s) => Ok(Scalar::Text(s.clone())),
            Value::Array(_) => Err(StatsError::malformed("expected a scalar, found an array")),
            Value::Object(_) => Err(StatsError::malformed("expected a scalar, found an object")),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Integer(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Scalar::Decimal(value)
    }
}

impl From<DateTime<FixedOffset>> for Scalar {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Scalar::Timestamp(value)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(value: NaiveDateTime) -> Self {
        Scalar::NaiveTimestamp(value)
    }
}

impl From<TimeDelta> for Scalar {
    fn from(value: TimeDelta) -> Self {
        Scalar::Duration(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_leaves() {
        assert_eq!(Scalar::from_json(&json!(null)).unwrap(), Scalar::Null);
        assert_eq!(Scalar::from_json(&json!(12)).unwrap(), Scalar::Integer(12));
        assert_eq!(Scalar::from_json(&json!(1.5)).unwrap(), Scalar::Float(1.5));
        assert_eq!(
            Scalar::from_json(&json!("42")).unwrap(),
            Scalar::Text("42".to_string())
        );
    }

    #[test]
    fn test_from_json_rejects_containers() {
        assert!(Scalar::from_json(&json!([1, 2])).is_err());
        assert!(Scalar::from_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_option_conversion() {
        let missing: Option<i64> = None;
        assert_eq!(Scalar::from(missing), Scalar::Null);
        assert_eq!(Scalar::from(Some(3i64)), Scalar::Integer(3));
    }
}
