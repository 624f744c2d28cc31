//! JSON rendering of result rows
//!
//! Store-native values that JSON has no type for are converted here:
//!
//! - timestamps become ISO-8601 strings in wall-clock time with the offset dropped
//! - durations become a float count of seconds
//! - decimals become floats (precision loss is accepted)
//!
//! Anything else that cannot be represented fails the whole serialization.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};

use crate::error::{StatsError, StatsResult};
use crate::scalar::{Row, Scalar};

/// Serialize a full result set as a JSON array of row arrays
pub fn serialize_rows(rows: &[Row]) -> StatsResult<Value> {
    rows.iter()
        .map(|row| serialize_row(row))
        .collect::<StatsResult<Vec<_>>>()
        .map(Value::Array)
}

/// Serialize one row as a JSON array
pub fn serialize_row(row: &[Scalar]) -> StatsResult<Value> {
    row.iter()
        .map(serialize_scalar)
        .collect::<StatsResult<Vec<_>>>()
        .map(Value::Array)
}

/// Serialize a single value
pub fn serialize_scalar(value: &Scalar) -> StatsResult<Value> {
    match value {
        Scalar::Null => Ok(Value::Null),
        Scalar::Bool(b) => Ok(Value::Bool(*b)),
        Scalar::Integer(i) => Ok(Value::Number((*i).into())),
        Scalar::Float(f) => float_value(*f),
        Scalar::Text(s) => Ok(Value::String(s.clone())),
        Scalar::Timestamp(ts) => Ok(Value::String(iso_format(&ts.naive_local()))),
        Scalar::NaiveTimestamp(ts) => Ok(Value::String(iso_format(ts))),
        Scalar::Duration(delta) => float_value(total_seconds(delta)),
        Scalar::Decimal(d) => float_value(decimal_to_f64(d)?),
        Scalar::Unsupported { type_name } => Err(StatsError::serialization(format!(
            "can't serialize value of type {}",
            type_name
        ))),
    }
}

/// Format a naive timestamp the way ISO-8601 readers expect:
/// seconds always present, microseconds only when non-zero.
pub fn iso_format(ts: &NaiveDateTime) -> String {
    let micros = ts.nanosecond() / 1_000;
    if micros == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        format!("{}.{:06}", ts.format("%Y-%m-%dT%H:%M:%S"), micros)
    }
}

/// Total elapsed time of a duration in seconds
pub fn total_seconds(delta: &TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1_000_000_000.0
}

fn decimal_to_f64(d: &Decimal) -> StatsResult<f64> {
    d.to_f64()
        .ok_or_else(|| StatsError::serialization(format!("decimal {} does not fit a float", d)))
}

fn float_value(f: f64) -> StatsResult<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| StatsError::serialization(format!("non-finite float {}", f)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_timestamp_offset_is_stripped() {
        let ts = DateTime::parse_from_rfc3339("2020-01-01T12:00:00+05:00").unwrap();
        assert_eq!(
            serialize_scalar(&Scalar::Timestamp(ts)).unwrap(),
            json!("2020-01-01T12:00:00")
        );
    }

    #[test]
    fn test_timestamp_keeps_microseconds() {
        let ts = NaiveDate::from_ymd_opt(2013, 4, 5)
            .unwrap()
            .and_hms_micro_opt(6, 7, 8, 120)
            .unwrap();
        assert_eq!(
            serialize_scalar(&Scalar::NaiveTimestamp(ts)).unwrap(),
            json!("2013-04-05T06:07:08.000120")
        );
    }

    #[test]
    fn test_duration_as_seconds() {
        assert_eq!(
            serialize_scalar(&Scalar::Duration(TimeDelta::seconds(90))).unwrap(),
            json!(90.0)
        );
        assert_eq!(
            serialize_scalar(&Scalar::Duration(TimeDelta::milliseconds(-1500))).unwrap(),
            json!(-1.5)
        );
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_decimal_as_float() {
        let d = Decimal::from_str("3.14").unwrap();
        assert_eq!(serialize_scalar(&Scalar::Decimal(d)).unwrap(), json!(3.14));
    }

    #[test]
    fn test_plain_values_pass_through() {
        let row = vec![
            Scalar::Null,
            Scalar::Bool(true),
            Scalar::Integer(7),
            Scalar::Float(0.25),
            Scalar::Text("female".to_string()),
        ];
        assert_eq!(
            serialize_row(&row).unwrap(),
            json!([null, true, 7, 0.25, "female"])
        );
    }

    #[test]
    fn test_unsupported_value_fails_closed() {
        let rows = vec![
            vec![Scalar::Integer(1)],
            vec![Scalar::Unsupported {
                type_name: "bytea".to_string(),
            }],
        ];
        let err = serialize_rows(&rows).unwrap_err();
        assert_eq!(err.category(), "serialization");
        assert!(err.to_string().contains("bytea"));
    }

    #[test]
    fn test_non_finite_float_fails() {
        assert!(serialize_scalar(&Scalar::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_rows_render_as_nested_arrays() {
        let rows = vec![
            vec![Scalar::from("male"), Scalar::from(10i64)],
            vec![Scalar::from("female"), Scalar::from(12i64)],
        ];
        assert_eq!(
            serialize_rows(&rows).unwrap(),
            json!([["male", 10], ["female", 12]])
        );
    }
}
