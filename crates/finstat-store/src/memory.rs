//! In-memory store implementation.

use async_trait::async_trait;
use finstat_core::{Filter, FinstatError, Result, TableStore, WriteOutcome, tabular::filter_rows};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Simple in-memory store for testing and development.
///
/// Tables are kept in a `RwLock`-protected `HashMap` and are lost when the
/// store is dropped. A replace swaps the whole frame under the write lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, DataFrame>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all stored tables, sorted.
    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TableStore for InMemoryStore {
    #[instrument(skip(self, rows), fields(table = %table, rows = rows.height()))]
    async fn replace(&self, table: &str, rows: &DataFrame) -> Result<WriteOutcome> {
        if rows.height() == 0 {
            info!("Nothing to persist, leaving table untouched");
            return Ok(WriteOutcome::NothingToPersist);
        }

        let mut tables = self.tables.write().await;
        tables.insert(table.to_string(), rows.clone());
        info!("Replaced table with {} rows", rows.height());
        Ok(WriteOutcome::Written {
            rows: rows.height(),
        })
    }

    #[instrument(skip(self, filters), fields(table = %table, filters = filters.len()))]
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<DataFrame> {
        let tables = self.tables.read().await;
        let df = tables
            .get(table)
            .ok_or_else(|| FinstatError::TableNotFound(table.to_string()))?;
        let out = filter_rows(df, filters)?;
        debug!("Read {} rows", out.height());
        Ok(out)
    }

    async fn contains(&self, table: &str) -> Result<bool> {
        Ok(self.tables.read().await.contains_key(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finstat_core::tabular::string_values;
    use polars::prelude::*;

    fn industry() -> DataFrame {
        DataFrame::new(vec![
            Column::new("code".into(), vec!["000651", "000333", "600000"]),
            Column::new("name".into(), vec!["Gree", "Midea", "SPDB"]),
            Column::new(
                "subclass_name".into(),
                vec!["Appliances", "Appliances", "Banking"],
            ),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_replace_and_query() {
        let store = InMemoryStore::new();
        let outcome = store.replace("industry", &industry()).await.unwrap();
        assert_eq!(outcome.rows(), 3);

        let appliances = store
            .query("industry", &[Filter::eq("subclass_name", "Appliances")])
            .await
            .unwrap();
        assert_eq!(
            string_values(&appliances, "name").unwrap(),
            vec![Some("Gree".to_string()), Some("Midea".to_string())]
        );
    }

    #[tokio::test]
    async fn test_replace_is_idempotent() {
        let store = InMemoryStore::new();
        store.replace("industry", &industry()).await.unwrap();
        store.replace("industry", &industry()).await.unwrap();

        let stored = store.query("industry", &[]).await.unwrap();
        assert!(stored.equals_missing(&industry()));
        assert_eq!(store.table_names().await, vec!["industry".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_replace_is_noop() {
        let store = InMemoryStore::new();
        let outcome = store.replace("industry", &DataFrame::empty()).await.unwrap();
        assert_eq!(outcome, WriteOutcome::NothingToPersist);
        assert!(!store.contains("industry").await.unwrap());
    }

    #[tokio::test]
    async fn test_query_missing_table() {
        let store = InMemoryStore::new();
        let err = store.query("statement", &[]).await.unwrap_err();
        assert!(matches!(err, FinstatError::TableNotFound(_)));
    }
}
