//! Store trait for persisting result tables.
//!
//! This module defines the [`TableStore`] trait: whole-table replace on the
//! write side and filtered reads on the query side.

use async_trait::async_trait;
use polars::prelude::DataFrame;

use crate::{error::Result, types::WriteOutcome};

/// Row filter applied by [`TableStore::query`].
///
/// Filters passed together are combined with AND.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Column equals the value.
    Eq(String, String),
    /// Column equals any of the values.
    In(String, Vec<String>),
}

impl Filter {
    /// Equality filter.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    /// Membership filter.
    #[must_use]
    pub fn any_of<S: Into<String>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    /// Returns the filtered column.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(c, _) | Self::In(c, _) => c,
        }
    }

    /// Returns true if `value` passes the filter.
    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Eq(_, expected), Some(v)) => expected == v,
            (Self::In(_, expected), Some(v)) => expected.iter().any(|e| e == v),
            (_, None) => false,
        }
    }
}

/// Durable storage for named tables.
///
/// Writes replace a table wholesale: readers observe either the previous
/// contents or the new contents, never a mix.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Replaces the contents of `table` with `rows`.
    ///
    /// An empty `rows` leaves the store untouched and returns
    /// [`WriteOutcome::NothingToPersist`].
    async fn replace(&self, table: &str, rows: &DataFrame) -> Result<WriteOutcome>;

    /// Reads the rows of `table` that pass every filter.
    ///
    /// Returns [`FinstatError::TableNotFound`](crate::FinstatError::TableNotFound)
    /// if the table has never been written.
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<DataFrame>;

    /// Returns true if `table` exists.
    async fn contains(&self, table: &str) -> Result<bool>;
}
