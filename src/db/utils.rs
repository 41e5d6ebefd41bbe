use std::str::FromStr;

use sqlx::{postgres::PgRow, Row};

use super::error::StoreError;

// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Decodes a TEXT column into one of the ledger's enums.
pub fn enum_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = StoreError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
}

pub fn count_column(row: &PgRow, column: &str) -> Result<u64, StoreError> {
    let count: i64 = row.try_get(column)?;
    Ok(u64::try_from(count).unwrap_or_default())
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

/// Name of the unique constraint or index `err` violated, if it is a unique violation.
pub fn violated_unique(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if is_unique_violation(err) => db_err.constraint(),
        _ => None,
    }
}

/// Wraps a user search term for ILIKE, escaping its wildcards.
pub fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
