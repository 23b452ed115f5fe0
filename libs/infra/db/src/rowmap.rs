// [libs/infra/db/src/rowmap.rs]
//! Transformación de filas libSQL a tipos del dominio. Todo valor
//! temporal viaja por el ledger como RFC 3339 UTC con precisión fija
//! de microsegundos y sufijo Z: el orden lexicográfico del texto
//! coincide con el orden cronológico, y `ORDER BY created_at` es FIFO.

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Row, Value};

use crate::errors::DbError;

/// Forma canónica de un instante en el ledger.
pub fn fmt_ts(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw_timestamp: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw_timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|parse_fault| {
            DbError::MappingError(format!("timestamp '{raw_timestamp}': {parse_fault}"))
        })
}

pub fn text_at(row: &Row, index: i32) -> Result<String, DbError> {
    match row.get_value(index)? {
        Value::Text(text) => Ok(text),
        other => Err(DbError::MappingError(format!("columna {index}: se esperaba TEXT, llegó {other:?}"))),
    }
}

pub fn opt_text_at(row: &Row, index: i32) -> Result<Option<String>, DbError> {
    match row.get_value(index)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(DbError::MappingError(format!("columna {index}: se esperaba TEXT|NULL, llegó {other:?}"))),
    }
}

pub fn int_at(row: &Row, index: i32) -> Result<i64, DbError> {
    match row.get_value(index)? {
        Value::Integer(value) => Ok(value),
        other => Err(DbError::MappingError(format!("columna {index}: se esperaba INTEGER, llegó {other:?}"))),
    }
}

pub fn opt_int_at(row: &Row, index: i32) -> Result<Option<i64>, DbError> {
    match row.get_value(index)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(DbError::MappingError(format!("columna {index}: se esperaba INTEGER|NULL, llegó {other:?}"))),
    }
}

pub fn bool_at(row: &Row, index: i32) -> Result<bool, DbError> {
    Ok(int_at(row, index)? != 0)
}

pub fn datetime_at(row: &Row, index: i32) -> Result<DateTime<Utc>, DbError> {
    parse_ts(&text_at(row, index)?)
}

pub fn opt_datetime_at(row: &Row, index: i32) -> Result<Option<DateTime<Utc>>, DbError> {
    opt_text_at(row, index)?.map(|text| parse_ts(&text)).transpose()
}
