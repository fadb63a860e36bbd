//! Small helpers shared by the entity models.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row};
use rust_decimal::Decimal;

use fp_core::error::FpError;

/// Map a rusqlite error to FpError, surfacing UNIQUE violations as conflicts.
pub fn db_err(e: rusqlite::Error) -> FpError {
    if let rusqlite::Error::SqliteFailure(ref failure, ref msg) = e {
        if failure.code == ErrorCode::ConstraintViolation {
            let detail = msg.clone().unwrap_or_else(|| failure.to_string());
            if detail.contains("UNIQUE") {
                return FpError::Conflict(detail);
            }
            return FpError::Validation(detail);
        }
    }
    FpError::Database(e.to_string())
}

/// Turn `QueryReturnedNoRows` into `Ok(None)`.
pub fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, FpError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Read a TEXT column holding a decimal amount.
pub fn get_decimal(row: &Row<'_>, column: &str) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(column)?;
    parse_decimal(column, &raw)
}

/// Read a nullable TEXT column holding a decimal amount.
pub fn get_opt_decimal(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|r| parse_decimal(column, &r)).transpose()
}

fn parse_decimal(column: &str, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("column {column}: {e}").into(),
        )
    })
}
