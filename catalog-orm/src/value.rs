//! # Values
//!
//! Conversion between Rust field types and the values sent to (and read from)
//! the `Any` driver. Decimals and timestamps travel as text so every backend
//! sees the same representation; everything else uses native driver types.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{
    Arguments, Row, ValueRef,
    any::{AnyArguments, AnyRow},
    error::BoxDynError,
};

use crate::{database::Drivers, Error};

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Appends the value to the argument list in the representation the driver expects.
    pub(crate) fn bind(self, driver: Drivers, args: &mut AnyArguments<'_>) -> Result<(), Error> {
        let result = match self {
            Value::Null => args.add(Option::<String>::None),
            Value::Bool(v) => args.add(v),
            Value::Int(v) => args.add(v),
            Value::Double(v) => args.add(v),
            Value::Text(v) => args.add(v),
            Value::Decimal(v) => args.add(v.to_string()),
            Value::Timestamp(v) => args.add(format_timestamp(&v, driver)),
        };
        result.map_err(sqlx::Error::Encode)?;
        Ok(())
    }
}

// ============================================================================
// ColumnValue Trait
// ============================================================================

/// Rust types that can be stored in a model field.
pub trait ColumnValue: Sized {
    fn to_value(&self) -> Value;

    /// Reads the named column from a row selected by the query builder.
    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error>;

    /// Brings a fixed-point value to `decimal_places` digits after the point.
    ///
    /// SQLite stores `DECIMAL` with numeric affinity and drops trailing zeros.
    fn rescaled(self, _decimal_places: u32) -> Self {
        self
    }
}

fn decode_error(column: &str, source: impl Into<BoxDynError>) -> sqlx::Error {
    sqlx::Error::ColumnDecode { index: column.to_string(), source: source.into() }
}

impl ColumnValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        row.try_get::<i64, _>(column)
    }
}

impl ColumnValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        let wide = row.try_get::<i64, _>(column)?;
        i32::try_from(wide).map_err(|e| decode_error(column, e))
    }
}

impl ColumnValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        // SQLite keeps booleans as integers
        match row.try_get::<bool, _>(column) {
            Ok(v) => Ok(v),
            Err(_) => Ok(row.try_get::<i64, _>(column)? != 0),
        }
    }
}

impl ColumnValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        row.try_get::<f64, _>(column)
    }
}

impl ColumnValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        row.try_get::<String, _>(column)
    }
}

impl ColumnValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        let text = row.try_get::<String, _>(column)?;
        Decimal::from_str(text.trim()).map_err(|e| decode_error(column, e))
    }

    fn rescaled(mut self, decimal_places: u32) -> Self {
        self.rescale(decimal_places);
        self
    }
}

impl ColumnValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        let text = row.try_get::<String, _>(column)?;
        parse_timestamp(&text)
            .ok_or_else(|| decode_error(column, format!("unrecognized timestamp `{}`", text)))
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_row(row: &AnyRow, column: &str) -> Result<Self, sqlx::Error> {
        if row.try_get_raw(column)?.is_null() {
            return Ok(None);
        }
        T::from_row(row, column).map(Some)
    }

    fn rescaled(self, decimal_places: u32) -> Self {
        self.map(|v| v.rescaled(decimal_places))
    }
}

// ============================================================================
// Timestamp Helpers
// ============================================================================

/// Formats a timestamp for binding. MySQL `DATETIME` does not take an offset.
pub fn format_timestamp(value: &DateTime<Utc>, driver: Drivers) -> String {
    match driver {
        Drivers::MySQL => value.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        _ => value.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}

/// Parses the textual timestamps the supported backends produce.
///
/// Accepts RFC 3339, PostgreSQL's `2024-10-21 23:00:00.5+00` and offset-less
/// values (SQLite `CURRENT_TIMESTAMP`, MySQL `DATETIME`), which are read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
