//! Renaming provider field codes to domain column names.

use finstat_core::{FinstatError, NameDictionary, Result, fields, tabular::missing_columns};
use polars::prelude::*;
use tracing::debug;

/// Restricts `raw` to the dictionary's columns, renamed and in dictionary order.
///
/// Columns the dictionary does not mention are dropped. Text columns are cast
/// to strings and every other column to `Float64`; values that do not parse
/// become null. A frame without columns normalizes to an empty frame.
///
/// # Errors
/// Returns [`FinstatError::MissingColumns`] if `raw` lacks a dictionary code.
pub fn normalize(raw: &DataFrame, dictionary: &NameDictionary, table: &str) -> Result<DataFrame> {
    if raw.width() == 0 {
        return Ok(DataFrame::empty());
    }

    let absent = missing_columns(raw, dictionary.entries().iter().map(|e| e.code.as_str()));
    if !absent.is_empty() {
        let columns = dictionary
            .entries()
            .iter()
            .filter(|e| absent.contains(&e.code))
            .map(|e| e.name.clone())
            .collect();
        return Err(FinstatError::MissingColumns {
            table: table.to_string(),
            columns,
        });
    }

    let columns = dictionary
        .entries()
        .iter()
        .map(|entry| {
            let dtype = if fields::is_text(&entry.name) {
                DataType::String
            } else {
                DataType::Float64
            };
            let mut column = raw.column(&entry.code)?.cast(&dtype)?;
            column.rename(entry.name.as_str().into());
            Ok(column)
        })
        .collect::<Result<Vec<Column>>>()?;

    let out = DataFrame::new(columns)?;
    debug!(table, rows = out.height(), columns = out.width(), "Normalized");
    Ok(out)
}
