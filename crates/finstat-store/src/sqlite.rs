//! SQLite-based store implementation.

use async_trait::async_trait;
use finstat_core::{
    Filter, FinstatError, Result, TableStore, WriteOutcome,
    tabular::{float_values, string_values},
};
use polars::prelude::*;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// Storage class of a persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Real,
    Text,
}

impl ColumnKind {
    fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32 => Self::Real,
            _ => Self::Text,
        }
    }

    fn from_decl(decl: &str) -> Self {
        if decl.eq_ignore_ascii_case("REAL") {
            Self::Real
        } else {
            Self::Text
        }
    }

    const fn sql(&self) -> &'static str {
        match self {
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

/// Quotes an SQL identifier.
fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite-based store for result tables.
///
/// Each logical table maps to one SQLite table whose columns mirror the
/// DataFrame: numeric columns are stored as `REAL`, everything else as `TEXT`.
/// A replace drops and recreates the table inside one transaction.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| FinstatError::Store(e.to_string()))?;
        debug!("SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| FinstatError::Store(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns the persisted columns of `table`, or `None` if it does not exist.
    fn table_columns(conn: &Connection, table: &str) -> Result<Option<Vec<(String, ColumnKind)>>> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| FinstatError::Store(e.to_string()))?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", ident(table)))
            .map_err(|e| FinstatError::Store(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(|e| FinstatError::Store(e.to_string()))?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, decl) = row.map_err(|e| FinstatError::Store(e.to_string()))?;
            columns.push((name, ColumnKind::from_decl(&decl)));
        }
        Ok(Some(columns))
    }

    /// Extracts the frame as SQLite values, one vector per column.
    fn frame_values(rows: &DataFrame) -> Result<Vec<(String, ColumnKind, Vec<Value>)>> {
        rows.get_columns()
            .iter()
            .map(|column| {
                let name = column.name().to_string();
                let kind = ColumnKind::of(column.dtype());
                let values = match kind {
                    ColumnKind::Real => float_values(rows, &name)?
                        .into_iter()
                        .map(|v| v.map_or(Value::Null, Value::Real))
                        .collect(),
                    ColumnKind::Text => string_values(rows, &name)?
                        .into_iter()
                        .map(|v| v.map_or(Value::Null, Value::Text))
                        .collect(),
                };
                Ok((name, kind, values))
            })
            .collect()
    }
}

#[async_trait]
impl TableStore for SqliteStore {
    #[instrument(skip(self, rows), fields(table = %table, rows = rows.height()))]
    async fn replace(&self, table: &str, rows: &DataFrame) -> Result<WriteOutcome> {
        if rows.height() == 0 {
            info!("Nothing to persist, leaving table untouched");
            return Ok(WriteOutcome::NothingToPersist);
        }

        let columns = Self::frame_values(rows)?;
        let create = format!(
            "CREATE TABLE {} ({})",
            ident(table),
            columns
                .iter()
                .map(|(name, kind, _)| format!("{} {}", ident(name), kind.sql()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let insert = format!(
            "INSERT INTO {} VALUES ({})",
            ident(table),
            (1..=columns.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let conn = self
            .conn
            .lock()
            .map_err(|e| FinstatError::Store(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| FinstatError::Store(e.to_string()))?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", ident(table)), [])
            .map_err(|e| FinstatError::Store(e.to_string()))?;
        tx.execute(&create, [])
            .map_err(|e| FinstatError::Store(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(&insert)
                .map_err(|e| FinstatError::Store(e.to_string()))?;
            for i in 0..rows.height() {
                stmt.execute(params_from_iter(columns.iter().map(|(_, _, v)| &v[i])))
                    .map_err(|e| FinstatError::Store(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| FinstatError::Store(e.to_string()))?;
        info!("Replaced table with {} rows", rows.height());
        Ok(WriteOutcome::Written {
            rows: rows.height(),
        })
    }

    #[instrument(skip(self, filters), fields(table = %table, filters = filters.len()))]
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<DataFrame> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| FinstatError::Store(e.to_string()))?;

        let columns = Self::table_columns(&conn, table)?
            .ok_or_else(|| FinstatError::TableNotFound(table.to_string()))?;

        let mut clauses = Vec::with_capacity(filters.len());
        let mut args: Vec<&str> = Vec::new();
        for filter in filters {
            if !columns.iter().any(|(name, _)| name == filter.column()) {
                return Err(FinstatError::InvalidParameter(format!(
                    "unknown filter column `{}`",
                    filter.column()
                )));
            }
            match filter {
                Filter::Eq(column, value) => {
                    args.push(value);
                    clauses.push(format!("{} = ?{}", ident(column), args.len()));
                }
                Filter::In(_, values) if values.is_empty() => clauses.push("0".to_string()),
                Filter::In(column, values) => {
                    let placeholders = values
                        .iter()
                        .map(|v| {
                            args.push(v);
                            format!("?{}", args.len())
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    clauses.push(format!("{} IN ({placeholders})", ident(column)));
                }
            }
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns
                .iter()
                .map(|(name, _)| ident(name))
                .collect::<Vec<_>>()
                .join(", "),
            ident(table)
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| FinstatError::Store(e.to_string()))?;
        let mut rows = stmt
            .query(params_from_iter(args.iter()))
            .map_err(|e| FinstatError::Store(e.to_string()))?;

        let mut reals: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len()];
        let mut texts: Vec<Vec<Option<String>>> = vec![Vec::new(); columns.len()];
        while let Some(row) = rows.next().map_err(|e| FinstatError::Store(e.to_string()))? {
            for (i, (_, kind)) in columns.iter().enumerate() {
                match kind {
                    ColumnKind::Real => reals[i].push(
                        row.get::<_, Option<f64>>(i)
                            .map_err(|e| FinstatError::Store(e.to_string()))?,
                    ),
                    ColumnKind::Text => texts[i].push(
                        row.get::<_, Option<String>>(i)
                            .map_err(|e| FinstatError::Store(e.to_string()))?,
                    ),
                }
            }
        }

        let frame_columns = columns
            .iter()
            .enumerate()
            .map(|(i, (name, kind))| match kind {
                ColumnKind::Real => Column::new(name.as_str().into(), std::mem::take(&mut reals[i])),
                ColumnKind::Text => Column::new(name.as_str().into(), std::mem::take(&mut texts[i])),
            })
            .collect::<Vec<_>>();

        let df = DataFrame::new(frame_columns).map_err(|e| FinstatError::Store(e.to_string()))?;
        debug!("Read {} rows", df.height());
        Ok(df)
    }

    async fn contains(&self, table: &str) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| FinstatError::Store(e.to_string()))?;
        Ok(Self::table_columns(&conn, table)?.is_some())
    }
}
