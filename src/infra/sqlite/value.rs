use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};

use crate::domain::entities::value::Scalar;

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Int(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            Scalar::Float(value) => ToSqlOutput::Owned(Value::Real(*value)),
            Scalar::Bool(value) => ToSqlOutput::Owned(Value::Integer(i64::from(*value))),
            Scalar::Date(value) => {
                ToSqlOutput::Owned(Value::Text(value.format("%Y-%m-%d").to_string()))
            }
            Scalar::DateTime(value) => ToSqlOutput::Owned(Value::Text(
                value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            )),
            Scalar::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}

/// Stored value as-is. Text is not trimmed or parsed, so binding the result
/// back matches the same row.
pub fn scalar_from_sql(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(value) => Scalar::Int(value),
        ValueRef::Real(value) => Scalar::Float(value),
        ValueRef::Text(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}
