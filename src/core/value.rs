use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, NaiveDateTime, DateTime, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use super::error::{Result, ShardingError};

/// A single cell travelling through routing and merging.
///
/// Sharding values, group keys and aggregation inputs are all `Value`s, so the
/// type carries its own ordering and hashing rules instead of relying on a
/// database's comparator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    // Numeric types
    SmallInt(i16),
    Integer(i64),
    Real(f64),
    Numeric(Decimal),  // NUMERIC/DECIMAL with precision
    // String types
    Text(String),
    Char(String),      // Fixed-length CHAR(n)
    // Boolean
    Boolean(bool),
    // Date/Time types
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    // Special types
    Uuid(Uuid),
    Json(String),      // JSON as text
    Bytea(Vec<u8>),    // Binary data
}

impl Value {
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::SmallInt(i) => Some(*i as i64),
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Char(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value has a total order usable for sharding and aggregation.
    #[must_use]
    pub const fn is_comparable(&self) -> bool {
        !matches!(self, Self::Null | Self::Json(_))
    }

    const fn is_numeric(&self) -> bool {
        matches!(self, Self::SmallInt(_) | Self::Integer(_) | Self::Real(_) | Self::Numeric(_))
    }

    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::SmallInt(i) => Some(Decimal::from(*i)),
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Real(r) => Decimal::from_f64(*r),
            Self::Numeric(d) => Some(*d),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::SmallInt(i) => Some(f64::from(*i)),
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            Self::Numeric(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Compares two values of compatible types.
    ///
    /// Numbers compare across widths (integer, real, decimal), text compares
    /// with char, and two nulls are equal. Everything else yields `None`.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) | (_, Self::Null) => None,
            (a, b) if a.is_numeric() && b.is_numeric() => Self::compare_numbers(a, b),
            (Self::Text(a) | Self::Char(a), Self::Text(b) | Self::Char(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::TimestampTz(a), Self::TimestampTz(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Timestamp(b)) => a.and_hms_opt(0, 0, 0).map(|a| a.cmp(b)),
            (Self::Timestamp(a), Self::Date(b)) => b.and_hms_opt(0, 0, 0).map(|b| a.cmp(&b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Bytea(a), Self::Bytea(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Same as [`Value::compare`] but text is compared case-insensitively.
    #[must_use]
    pub fn compare_ignore_case(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a) | Self::Char(a), Self::Text(b) | Self::Char(b)) => {
                Some(a.to_lowercase().cmp(&b.to_lowercase()))
            }
            _ => self.compare(other),
        }
    }

    fn compare_numbers(a: &Self, b: &Self) -> Option<Ordering> {
        if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
            return Some(x.cmp(&y));
        }
        if matches!(a, Self::Real(_)) || matches!(b, Self::Real(_)) {
            return a.to_f64()?.partial_cmp(&b.to_f64()?);
        }
        Some(a.to_decimal()?.cmp(&b.to_decimal()?))
    }

    /// Lower-cases text so that case-insensitive columns group together.
    #[must_use]
    pub fn fold_case(&self) -> Self {
        match self {
            Self::Text(s) => Self::Text(s.to_lowercase()),
            Self::Char(s) => Self::Char(s.to_lowercase()),
            other => other.clone(),
        }
    }

    /// Adds two numeric values.
    ///
    /// Integer overflow is promoted to decimal; any real operand makes the
    /// result real.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        if let (Some(x), Some(y)) = (self.as_int(), other.as_int()) {
            return Ok(x.checked_add(y).map_or_else(
                || Self::Numeric(Decimal::from(x) + Decimal::from(y)),
                Self::Integer,
            ));
        }
        if matches!(self, Self::Real(_)) || matches!(other, Self::Real(_)) {
            if let (Some(x), Some(y)) = (self.to_f64(), other.to_f64()) {
                return Ok(Self::Real(x + y));
            }
        }
        match (self.to_decimal(), other.to_decimal()) {
            (Some(x), Some(y)) => x
                .checked_add(y)
                .map(Self::Numeric)
                .ok_or_else(|| ShardingError::NotComparable(format!("{self} + {other} overflows"))),
            _ => Err(ShardingError::NotComparable(format!(
                "cannot add {self} and {other}"
            ))),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::SmallInt(i) => i.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Real(r) => r.to_bits().hash(state),
            Self::Numeric(d) => d.normalize().hash(state),
            Self::Text(s) | Self::Char(s) | Self::Json(s) => s.hash(state),
            Self::Boolean(b) => b.hash(state),
            Self::Date(d) => d.hash(state),
            Self::Timestamp(t) => t.hash(state),
            Self::TimestampTz(t) => t.hash(state),
            Self::Uuid(u) => u.hash(state),
            Self::Bytea(b) => b.hash(state),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Numeric(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::SmallInt(i) => write!(f, "{i}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Numeric(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Char(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Self::TimestampTz(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S %Z")),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Json(j) => write!(f, "{j}"),
            Self::Bytea(b) => write!(f, "\\x{}", hex::encode(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_across_numeric_widths() {
        assert_eq!(Value::SmallInt(3).compare(&Value::Integer(7)), Some(Ordering::Less));
        assert_eq!(Value::Integer(2).compare(&Value::Real(1.5)), Some(Ordering::Greater));
        assert_eq!(
            Value::Numeric(Decimal::new(250, 2)).compare(&Value::Integer(2)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_compare_incompatible_types() {
        assert_eq!(Value::Integer(1).compare(&Value::Text("1".into())), None);
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_ignore_case() {
        let a = Value::Text("Alpha".into());
        let b = Value::Text("alpha".into());
        assert_ne!(a.compare(&b), Some(Ordering::Equal));
        assert_eq!(a.compare_ignore_case(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_checked_add_promotes_on_overflow() {
        let sum = Value::Integer(i64::MAX).checked_add(&Value::Integer(1)).unwrap();
        assert_eq!(sum, Value::Numeric(Decimal::from(i64::MAX) + Decimal::ONE));
    }

    #[test]
    fn test_checked_add_mixed() {
        assert_eq!(
            Value::Integer(2).checked_add(&Value::Real(0.5)).unwrap(),
            Value::Real(2.5)
        );
        assert!(Value::Text("a".into()).checked_add(&Value::Integer(1)).is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Text("hello".to_string()).to_string(), "hello");
        assert_eq!(Value::Bytea(vec![0xab, 0x01]).to_string(), "\\xab01");
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(Value::Text("MiXeD".into()).fold_case(), Value::Text("mixed".into()));
        assert_eq!(Value::Integer(5).fold_case(), Value::Integer(5));
    }
}
