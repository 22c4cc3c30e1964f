use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Number, Value};
use sqlx::{mysql::MySqlRow, Column, Row as _, TypeInfo, ValueRef};

use crate::db::Row;

/// How a column's value is decoded into JSON, chosen from the MySQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Signed,
    Unsigned,
    Year,
    Float,
    Double,
    /// Kept as text so no precision is lost
    Decimal,
    Date,
    DateTime,
    Timestamp,
    Time,
    Json,
    Bytes,
    Text,
}

fn column_kind(type_name: &str) -> ColumnKind {
    match type_name {
        "BOOLEAN" => ColumnKind::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnKind::Signed,
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => ColumnKind::Unsigned,
        "YEAR" => ColumnKind::Year,
        "FLOAT" => ColumnKind::Float,
        "DOUBLE" => ColumnKind::Double,
        "DECIMAL" => ColumnKind::Decimal,
        "DATE" => ColumnKind::Date,
        "DATETIME" => ColumnKind::DateTime,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "TIME" => ColumnKind::Time,
        "JSON" => ColumnKind::Json,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => ColumnKind::Bytes,
        _ => ColumnKind::Text,
    }
}

/// Converts a MySQL row into a JSON object keyed by column name.
pub fn to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let value = column_value(
                row,
                column.ordinal(),
                column.name(),
                column.type_info().name(),
            );
            (column.name().to_string(), value)
        })
        .collect()
}

fn column_value(row: &MySqlRow, index: usize, column: &str, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(column, type_name, error = %e, "Column could not be read, using null");
            return Value::Null;
        }
    }

    let value = match column_kind(type_name) {
        ColumnKind::Bool => row.try_get::<bool, _>(index).map(Value::Bool),
        ColumnKind::Signed => row.try_get::<i64, _>(index).map(Value::from),
        ColumnKind::Unsigned => row.try_get::<u64, _>(index).map(Value::from),
        ColumnKind::Year => row.try_get::<u16, _>(index).map(Value::from),
        ColumnKind::Float => row
            .try_get::<f32, _>(index)
            .map(|v| float_value(f64::from(v))),
        ColumnKind::Double => row.try_get::<f64, _>(index).map(float_value),
        ColumnKind::Decimal => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::String),
        ColumnKind::Date => row
            .try_get::<NaiveDate, _>(index)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ColumnKind::DateTime => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string())),
        ColumnKind::Timestamp => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|d| Value::String(d.to_rfc3339())),
        ColumnKind::Time => row
            .try_get::<NaiveTime, _>(index)
            .map(|t| Value::String(t.format("%H:%M:%S").to_string())),
        ColumnKind::Json => row.try_get::<Value, _>(index),
        ColumnKind::Bytes => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        ColumnKind::Text => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::String),
    };

    value.unwrap_or_else(|e| {
        // e.g. a zero DATETIME such as 0000-00-00 00:00:00
        tracing::debug!(column, type_name, error = %e, "Column could not be decoded, using null");
        Value::Null
    })
}

/// NaN and infinities have no JSON form.
fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}
