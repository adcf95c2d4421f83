//! Conversions between provider records and DataFrames.
//!
//! Provider endpoints answer with a list of flat JSON objects. Column types are
//! inferred per column: a column whose non-null values are all numbers becomes
//! `Float64`, anything else becomes `String`.

use polars::prelude::*;
use serde_json::{Map, Value};

use crate::error::{FinstatError, Result};
use crate::store::Filter;

/// A single provider record.
pub type Record = Map<String, Value>;

/// Builds a DataFrame from provider records.
///
/// Columns appear in order of first occurrence. Records lacking a key get a
/// null in that column.
///
/// # Errors
/// Returns an error if the frame cannot be assembled.
pub fn records_to_frame(records: &[Record]) -> Result<DataFrame> {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !names.contains(&key.as_str()) {
                names.push(key);
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values: Vec<Option<&Value>> = records
                .iter()
                .map(|r| r.get(name).filter(|v| !v.is_null()))
                .collect();
            let numeric = values.iter().flatten().all(|v| v.is_number());
            if numeric {
                let floats: Vec<Option<f64>> =
                    values.iter().map(|v| v.and_then(Value::as_f64)).collect();
                Column::new(name.into(), floats)
            } else {
                let texts: Vec<Option<String>> =
                    values.iter().map(|v| v.map(value_to_string)).collect();
                Column::new(name.into(), texts)
            }
        })
        .collect::<Vec<_>>();

    DataFrame::new(columns).map_err(|e| FinstatError::Parse(e.to_string()))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns true if the frame carries every named column.
#[must_use]
pub fn has_columns(df: &DataFrame, columns: &[&str]) -> bool {
    let present = df.get_column_names();
    columns
        .iter()
        .all(|c| present.iter().any(|p| p.as_str() == *c))
}

/// Returns the named columns absent from the frame.
#[must_use]
pub fn missing_columns<'a>(df: &DataFrame, columns: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let present = df.get_column_names();
    columns
        .into_iter()
        .filter(|c| !present.iter().any(|p| p.as_str() == *c))
        .map(str::to_string)
        .collect()
}

/// Reads a column as optional strings, casting non-string columns.
///
/// # Errors
/// Returns an error if the column is absent or cannot be cast.
pub fn string_values(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
    let casted = df.column(column)?.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Reads a column as optional floats, casting non-float columns.
///
/// # Errors
/// Returns an error if the column is absent or cannot be cast.
pub fn float_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let casted = df.column(column)?.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Returns the distinct non-null strings of a column in first-seen order.
///
/// # Errors
/// Returns an error if the column is absent.
pub fn distinct_strings(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for value in string_values(df, column)?.into_iter().flatten() {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    Ok(out)
}

/// Keeps the rows that pass every filter.
///
/// # Errors
/// Returns [`FinstatError::InvalidParameter`] if a filtered column is absent.
pub fn filter_rows(df: &DataFrame, filters: &[Filter]) -> Result<DataFrame> {
    if filters.is_empty() {
        return Ok(df.clone());
    }
    let mut mask = vec![true; df.height()];
    for filter in filters {
        if !has_columns(df, &[filter.column()]) {
            return Err(FinstatError::InvalidParameter(format!(
                "unknown filter column `{}`",
                filter.column()
            )));
        }
        for (keep, value) in mask.iter_mut().zip(string_values(df, filter.column())?) {
            *keep = *keep && filter.matches(value.as_deref());
        }
    }
    let mask = BooleanChunked::from_slice("mask".into(), &mask);
    Ok(df.filter(&mask)?)
}

/// Builds an all-null `Float64` column of the given length.
#[must_use]
pub fn null_float_column(name: &str, len: usize) -> Column {
    Column::new(name.into(), vec![None::<f64>; len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        match v {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    #[test]
    fn infers_column_types() {
        let records = vec![
            record(json!({"SECCODE": "000651", "F035N": 1.5e10, "ENDDATE": "2018-12-31"})),
            record(json!({"SECCODE": "000333", "F035N": null, "F036N": 7})),
        ];
        let df = records_to_frame(&records).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 4);
        assert_eq!(df.column("SECCODE").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("F035N").unwrap().dtype(), &DataType::Float64);
        assert_eq!(
            float_values(&df, "F036N").unwrap(),
            vec![None, Some(7.0)]
        );
        assert_eq!(
            string_values(&df, "ENDDATE").unwrap(),
            vec![Some("2018-12-31".to_string()), None]
        );
    }

    #[test]
    fn mixed_columns_become_text() {
        let records = vec![
            record(json!({"F001V": "033003"})),
            record(json!({"F001V": 71001})),
        ];
        let df = records_to_frame(&records).unwrap();
        assert_eq!(
            string_values(&df, "F001V").unwrap(),
            vec![Some("033003".to_string()), Some("71001".to_string())]
        );
    }

    #[test]
    fn no_records_gives_empty_frame() {
        let df = records_to_frame(&[]).unwrap();
        assert_eq!(df.width(), 0);
        assert_eq!(df.height(), 0);
    }

    #[test]
    fn filters_rows_conjunctively() {
        let df = DataFrame::new(vec![
            Column::new("name".into(), vec!["Gree", "Midea", "Haier"]),
            Column::new("subclass_name".into(), vec!["Appliances", "Appliances", "Other"]),
        ])
        .unwrap();

        let out = filter_rows(
            &df,
            &[
                Filter::eq("subclass_name", "Appliances"),
                Filter::any_of("name", ["Midea", "Haier"]),
            ],
        )
        .unwrap();
        assert_eq!(
            string_values(&out, "name").unwrap(),
            vec![Some("Midea".to_string())]
        );

        let err = filter_rows(&df, &[Filter::eq("code", "000651")]).unwrap_err();
        assert!(matches!(err, FinstatError::InvalidParameter(_)));
    }

    #[test]
    fn reports_missing_columns() {
        let df = records_to_frame(&[record(json!({"code": "A", "name": "Alpha"}))]).unwrap();
        assert!(has_columns(&df, &["code", "name"]));
        assert_eq!(
            missing_columns(&df, ["code", "report_period"]),
            vec!["report_period".to_string()]
        );
    }
}
