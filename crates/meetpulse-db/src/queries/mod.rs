//! Query functions, one module per table family. Every function takes a
//! `&Connection` so it can run either on a reader or inside a write
//! transaction (`Transaction` derefs to `Connection`).

pub mod challenges;
pub mod meetings;
pub mod polls;
pub mod questions;
pub mod users;
pub mod votes;

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

use crate::{DbError, DbResult};

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> DbResult<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> DbResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::from(e)),
        }
    }
}

/// Read a TEXT column into an enum that parses from its wire name.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `?1, ?2, …, ?n` for an `IN (…)` clause.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
