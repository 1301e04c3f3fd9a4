//! Cell value types and per-column type metadata

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::Error;

/// A property value attached to a table, row, column or cell
pub type PropertyValue = serde_json::Value;

/// An ordered property bag
pub type Properties = BTreeMap<String, PropertyValue>;

/// Represents the value stored in a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value
    #[default]
    Null,

    /// Boolean value
    Boolean(bool),

    /// Numeric value
    Number(f64),

    /// String value
    String(String),

    /// Calendar date without time
    Date(NaiveDate),

    /// Date and time
    DateTime(NaiveDateTime),

    /// Time of day (hours, minutes, seconds, milliseconds)
    TimeOfDay(NaiveTime),
}

impl Value {
    /// Create a new string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(s.into())
    }

    /// Create a time of day value from its `[h, m, s, ms]` parts
    pub fn time_of_day(hour: u32, minute: u32, second: u32, milli: u32) -> Option<Self> {
        NaiveTime::from_hms_milli_opt(hour, minute, second, milli).map(Value::TimeOfDay)
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the `[h, m, s, ms]` parts of a time of day value
    pub fn time_parts(&self) -> Option<[u32; 4]> {
        match self {
            Value::TimeOfDay(t) => Some([
                t.hour(),
                t.minute(),
                t.second(),
                t.nanosecond() / 1_000_000,
            ]),
            _ => None,
        }
    }

    /// Drop sub-millisecond precision, which the interchange format cannot carry
    pub fn truncated_to_millis(self) -> Value {
        fn millis(nanos: u32) -> u32 {
            nanos / 1_000_000 * 1_000_000
        }
        match self {
            Value::DateTime(dt) => {
                Value::DateTime(dt.with_nanosecond(millis(dt.nanosecond())).unwrap_or(dt))
            }
            Value::TimeOfDay(t) => {
                Value::TimeOfDay(t.with_nanosecond(millis(t.nanosecond())).unwrap_or(t))
            }
            other => other,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(n) if !n.is_finite() => "non-finite number",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::TimeOfDay(_) => "timeofday",
        }
    }

    /// The column type this value naturally belongs to (None for null)
    pub fn natural_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Number(_) => Some(ColumnType::Number),
            Value::String(_) => Some(ColumnType::String),
            Value::Date(_) => Some(ColumnType::Date),
            Value::DateTime(_) => Some(ColumnType::DateTime),
            Value::TimeOfDay(_) => Some(ColumnType::TimeOfDay),
        }
    }

    /// Check whether this value may be stored in a column of the given type
    ///
    /// NaN and infinities fit no column.
    pub fn fits(&self, column_type: ColumnType) -> bool {
        match (self, column_type) {
            (Value::Null, _) => true,
            (Value::Number(n), _) if !n.is_finite() => false,
            (_, ColumnType::Function) => true,
            (value, ty) => value.natural_type() == Some(ty),
        }
    }

    /// Total ordering used for sorting: nulls first, then by type, then by value
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Date(_) => 4,
            Value::DateTime(_) => 5,
            Value::TimeOfDay(_) => 6,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M:%S")),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
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

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::TimeOfDay(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Number,
    String,
    Date,
    DateTime,
    TimeOfDay,
    Function,
}

impl ColumnType {
    /// Get the interchange name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::TimeOfDay => "timeofday",
            ColumnType::Function => "function",
        }
    }

    /// Parse an interchange name, rejecting unsupported types
    pub fn parse(s: &str) -> Result<Self, Error> {
        s.parse()
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(ColumnType::Boolean),
            "number" => Ok(ColumnType::Number),
            "string" => Ok(ColumnType::String),
            "date" => Ok(ColumnType::Date),
            "datetime" => Ok(ColumnType::DateTime),
            "timeofday" => Ok(ColumnType::TimeOfDay),
            "function" => Ok(ColumnType::Function),
            other => Err(Error::config(format!("Unsupported column type: {other}"))),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(42), Value::Number(42.0));
        assert_eq!(Value::from(3.5), Value::Number(3.5));
        assert_eq!(Value::from(true), Value::Boolean(true));
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
        assert_eq!(Value::from(None::<f64>), Value::Null);
    }

    #[test]
    fn test_value_fits_column_type() {
        assert!(Value::Null.fits(ColumnType::Date));
        assert!(Value::Number(1.0).fits(ColumnType::Number));
        assert!(!Value::Number(1.0).fits(ColumnType::String));
        assert!(!Value::string("1").fits(ColumnType::Number));
        assert!(Value::string("anything").fits(ColumnType::Function));
        let date = NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        assert!(Value::Date(date).fits(ColumnType::Date));
        assert!(!Value::Date(date).fits(ColumnType::DateTime));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(1.0).to_string(), "1");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Boolean(false).to_string(), "false");
        let tod = Value::time_of_day(9, 5, 0, 250).unwrap();
        assert_eq!(tod.to_string(), "09:05:00");
        assert_eq!(tod.time_parts(), Some([9, 5, 0, 250]));
    }

    #[test]
    fn test_total_ordering() {
        let mut values = vec![
            Value::Number(3.0),
            Value::Null,
            Value::Number(-1.0),
            Value::string("b"),
            Value::Boolean(true),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Number(-1.0),
                Value::Number(3.0),
                Value::string("b"),
            ]
        );
    }

    #[test]
    fn test_column_type_parse() {
        assert_eq!("timeofday".parse::<ColumnType>().unwrap(), ColumnType::TimeOfDay);
        assert_eq!(ColumnType::DateTime.to_string(), "datetime");
        assert!(matches!(
            "decimal".parse::<ColumnType>(),
            Err(Error::Configuration(_))
        ));
    }
}
