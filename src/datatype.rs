// used for persistence
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

// used for dates in the database
use chrono::NaiveDate;
// used for decimal numbers
use bigdecimal::BigDecimal;

// used when deserializing conditions and filter arguments
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};

// used when parsing a string to a decimal or a date
use std::str::FromStr;
// used to print out readable forms of a value
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A scalar cell value.
///
/// Every comparison made by the filtering engine goes through the *folded*
/// form of a value: its string form, lower-cased. `Null` has no string form
/// and therefore never matches anything.
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Decimal(BigDecimal),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    /// Lower-cased string form, `None` for `Null`.
    pub fn folded(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.to_lowercase()),
            // 2.50 folds like 2.5, and 3.0 like 3
            Value::Decimal(d) => {
                let normalized = d.normalized();
                let normalized = if normalized.as_bigint_and_exponent().1 < 0 {
                    normalized.with_scale(0)
                } else {
                    normalized
                };
                Some(normalized.to_string())
            }
            other => Some(other.to_string().to_lowercase()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}
impl From<BigDecimal> for Value {
    fn from(d: BigDecimal) -> Self {
        Value::Decimal(d)
    }
}
impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => Ok(ToSqlOutput::from(rusqlite::types::Null)),
            Value::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
            Value::Integer(i) => Ok(ToSqlOutput::from(*i)),
            // decimals and dates are kept as text so they survive the round trip exactly
            Value::Decimal(_) | Value::Date(_) => Ok(ToSqlOutput::from(self.to_string())),
        }
    }
}
impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Integer(i)),
            ValueRef::Real(r) => BigDecimal::from_str(&r.to_string())
                .map(Value::Decimal)
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Text(_) => value.as_str().map(Value::from),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Decimal(_) | Value::Date(_) => serializer.collect_str(self),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, a number or null")
    }
    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Text(b.to_string()))
    }
    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Integer(i))
    }
    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
        i64::try_from(u)
            .map(Value::Integer)
            .or_else(|_| self.visit_str(&u.to_string()))
    }
    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        BigDecimal::from_str(&f.to_string())
            .map(Value::Decimal)
            .map_err(|_| E::custom(format!("{} is not a finite number", f)))
    }
    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Text(s.to_owned()))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Declared type of a column in the persisted store.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug)]
pub enum ColumnType {
    Text,
    Integer,
    Date,
}

impl ColumnType {
    pub fn declared(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INT",
            ColumnType::Date => "DATE",
        }
    }
    /// Reads a stored cell back as a value of this type. Anything that does not
    /// fit the declared type is kept as it was stored.
    pub fn convert(&self, value: ValueRef) -> FromSqlResult<Value> {
        let stored = Value::column_result(value)?;
        Ok(match (self, stored) {
            (ColumnType::Date, Value::Text(s)) => match NaiveDate::parse_from_str(&s, DATE_FORMAT) {
                Ok(d) => Value::Date(d),
                Err(_) => Value::Text(s),
            },
            (ColumnType::Integer, Value::Text(s)) => match s.parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Text(s),
            },
            (ColumnType::Text, Value::Integer(i)) => Value::Text(i.to_string()),
            (_, other) => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_is_case_insensitive_string_form() {
        assert_eq!(Value::from("USA").folded(), Value::from("usa").folded());
        assert_eq!(Value::from(1000000).folded().as_deref(), Some("1000000"));
        let date = NaiveDate::from_ymd_opt(2023, 9, 1).unwrap();
        assert_eq!(Value::from(date).folded().as_deref(), Some("2023-09-01"));
        assert_eq!(Value::Null.folded(), None);
    }

    #[test]
    fn decimals_fold_without_trailing_zeros() {
        let decimal = |s: &str| Value::Decimal(BigDecimal::from_str(s).unwrap());
        assert_eq!(decimal("2.50").folded().as_deref(), Some("2.5"));
        assert_eq!(decimal("2.50").folded(), decimal("2.5").folded());
        assert_eq!(decimal("3.0").folded(), Value::from(3).folded());
        assert_eq!(decimal("100").folded().as_deref(), Some("100"));
        assert_eq!(decimal("1E+2").folded().as_deref(), Some("100"));
    }

    #[test]
    fn deserializes_by_json_shape() {
        let values: Vec<Value> = serde_json::from_str(r#"["a", 3, 2.5, null]"#).unwrap();
        assert_eq!(values[0], Value::from("a"));
        assert_eq!(values[1], Value::Integer(3));
        assert_eq!(values[2], Value::Decimal(BigDecimal::from_str("2.5").unwrap()));
        assert_eq!(values[3], Value::Null);
    }
}
