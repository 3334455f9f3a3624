//! Row decoding helpers for columns stored as text.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;

/// Parse a text column through `FromStr`.
pub fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: String = row.get(idx)?;
    value
        .parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

/// Parse a nullable text column through `FromStr`.
pub fn parse_optional_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: Option<String> = row.get(idx)?;
    value
        .map(|value| {
            value.parse().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
            })
        })
        .transpose()
}
