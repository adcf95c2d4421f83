//! Industry classification snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use finstat_core::{
    Classification, Filter, FinstatError, ProviderLayout, RemoteFetcher, Result, TableStore,
    WriteOutcome, fields,
    tabular::{distinct_strings, string_values},
};
use polars::prelude::*;
use tracing::{info, instrument, warn};

use crate::normalize::normalize;

/// Persisted industry classification of every listed entity.
///
/// [`refresh`](Self::refresh) replaces the snapshot; every other method reads
/// the persisted table. Lookups that find nothing, including lookups before the
/// first refresh, log a warning and return `None` or an empty list.
pub struct IndustryCatalog {
    fetcher: Arc<dyn RemoteFetcher>,
    layout: Arc<dyn ProviderLayout>,
    store: Arc<dyn TableStore>,
    table: String,
}

impl std::fmt::Debug for IndustryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndustryCatalog")
            .field("fetcher", &self.fetcher.name())
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl IndustryCatalog {
    /// Create a catalog persisted in the `industry` table.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        layout: Arc<dyn ProviderLayout>,
        store: Arc<dyn TableStore>,
    ) -> Self {
        Self {
            fetcher,
            layout,
            store,
            table: "industry".to_string(),
        }
    }

    /// Persist the catalog under another table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Returns the catalog table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fetch a fresh snapshot and replace the persisted catalog.
    ///
    /// Rows are de-duplicated by entity name, keeping the first, and sorted by
    /// class code then subclass code.
    ///
    /// # Errors
    /// Returns an error if the fetch, the renaming, or the write fails.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn refresh(&self) -> Result<WriteOutcome> {
        let request = self.layout.classification();
        let raw = self.fetcher.fetch(&request.endpoint, &request.params).await?;
        let normalized = normalize(&raw, &self.layout.classification_dictionary(), &self.table)?;

        let mut rows = classifications(&normalized)?;
        let fetched = rows.len();
        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row.name.clone()));
        rows.sort_by(|a, b| {
            (a.class_code.as_str(), a.subclass_code.as_str())
                .cmp(&(b.class_code.as_str(), b.subclass_code.as_str()))
        });
        if rows.len() < fetched {
            info!(dropped = fetched - rows.len(), "Dropped duplicate entity names");
        }

        self.store.replace(&self.table, &classification_frame(&rows)?).await
    }

    /// Returns every persisted classification in catalog order.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn classifications(&self) -> Result<Vec<Classification>> {
        classifications(&self.snapshot(&[]).await?)
    }

    /// Returns `(class_name, subclass_name)` of an entity.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn lookup_entity(&self, name: &str) -> Result<Option<(String, String)>> {
        let found = self.first_class(Filter::eq(fields::NAME, name)).await?;
        if found.is_none() {
            warn!(name, "Entity not found in catalog");
        }
        Ok(found)
    }

    /// Returns `(class_name, subclass_name)` for a subclass name.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn lookup_subclass(&self, subclass: &str) -> Result<Option<(String, String)>> {
        let found = self
            .first_class(Filter::eq(fields::SUBCLASS_NAME, subclass))
            .await?;
        if found.is_none() {
            warn!(subclass, "Subclass not found in catalog");
        }
        Ok(found)
    }

    /// Names of the entities in a subclass.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn entities_in_subclass(&self, subclass: &str) -> Result<Vec<String>> {
        self.values(Filter::eq(fields::SUBCLASS_NAME, subclass), fields::NAME)
            .await
    }

    /// Codes of the entities in a subclass.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn codes_in_subclass(&self, subclass: &str) -> Result<Vec<String>> {
        self.values(Filter::eq(fields::SUBCLASS_NAME, subclass), fields::CODE)
            .await
    }

    /// Names of the entities in a class.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn entities_in_class(&self, class: &str) -> Result<Vec<String>> {
        self.values(Filter::eq(fields::CLASS_NAME, class), fields::NAME)
            .await
    }

    /// Codes of the entities in a class.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn codes_in_class(&self, class: &str) -> Result<Vec<String>> {
        self.values(Filter::eq(fields::CLASS_NAME, class), fields::CODE)
            .await
    }

    /// Codes of the entities sharing the subclass of `name`, `name` included.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn peer_codes(&self, name: &str) -> Result<Vec<String>> {
        match self.lookup_entity(name).await? {
            Some((_, subclass)) => self.codes_in_subclass(&subclass).await,
            None => Ok(Vec::new()),
        }
    }

    /// Every entity name, in catalog order.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn entity_names(&self) -> Result<Vec<String>> {
        names_in(&self.snapshot(&[]).await?, fields::NAME)
    }

    /// Every class name, in catalog order.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn class_names(&self) -> Result<Vec<String>> {
        names_in(&self.snapshot(&[]).await?, fields::CLASS_NAME)
    }

    /// Subclass names of a class, in catalog order.
    ///
    /// # Errors
    /// Returns an error if the catalog table cannot be read.
    pub async fn subclass_names(&self, class: &str) -> Result<Vec<String>> {
        let subclasses = names_in(
            &self.snapshot(&[Filter::eq(fields::CLASS_NAME, class)]).await?,
            fields::SUBCLASS_NAME,
        )?;
        if subclasses.is_empty() {
            warn!(class, "Class not found in catalog");
        }
        Ok(subclasses)
    }

    /// Reads the persisted snapshot; a catalog never refreshed reads as empty.
    async fn snapshot(&self, filters: &[Filter]) -> Result<DataFrame> {
        match self.store.query(&self.table, filters).await {
            Err(FinstatError::TableNotFound(_)) => {
                warn!(table = %self.table, "Catalog has not been refreshed");
                Ok(DataFrame::empty())
            }
            other => other,
        }
    }

    async fn first_class(&self, filter: Filter) -> Result<Option<(String, String)>> {
        let rows = self.snapshot(&[filter]).await?;
        if rows.height() == 0 {
            return Ok(None);
        }
        let classes = string_values(&rows, fields::CLASS_NAME)?;
        let subclasses = string_values(&rows, fields::SUBCLASS_NAME)?;
        Ok(classes
            .into_iter()
            .zip(subclasses)
            .find_map(|(class, subclass)| Some((class?, subclass?))))
    }

    async fn values(&self, filter: Filter, column: &str) -> Result<Vec<String>> {
        let label = format!("{filter:?}");
        let rows = self.snapshot(&[filter]).await?;
        let values: Vec<String> = if rows.height() == 0 {
            Vec::new()
        } else {
            string_values(&rows, column)?.into_iter().flatten().collect()
        };
        if values.is_empty() {
            warn!(filter = %label, "No catalog entries match");
        }
        Ok(values)
    }
}

/// Distinct values of a catalog column; an empty snapshot has none.
fn names_in(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    distinct_strings(df, column)
}

/// Reads catalog rows; rows without a code or name are skipped.
fn classifications(df: &DataFrame) -> Result<Vec<Classification>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let codes = string_values(df, fields::CODE)?;
    let names = string_values(df, fields::NAME)?;
    let class_codes = string_values(df, fields::CLASS_CODE)?;
    let class_names = string_values(df, fields::CLASS_NAME)?;
    let subclass_codes = string_values(df, fields::SUBCLASS_CODE)?;
    let subclass_names = string_values(df, fields::SUBCLASS_NAME)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(name)) = (codes[i].clone(), names[i].clone()) else {
            continue;
        };
        rows.push(Classification {
            code,
            name,
            class_code: class_codes[i].clone().unwrap_or_default(),
            class_name: class_names[i].clone().unwrap_or_default(),
            subclass_code: subclass_codes[i].clone().unwrap_or_default(),
            subclass_name: subclass_names[i].clone().unwrap_or_default(),
        });
    }
    Ok(rows)
}

fn classification_frame(rows: &[Classification]) -> Result<DataFrame> {
    if rows.is_empty() {
        return Ok(DataFrame::empty());
    }
    Ok(DataFrame::new(vec![
        text_column(fields::CODE, rows, |r| r.code.as_str()),
        text_column(fields::NAME, rows, |r| r.name.as_str()),
        text_column(fields::CLASS_CODE, rows, |r| r.class_code.as_str()),
        text_column(fields::CLASS_NAME, rows, |r| r.class_name.as_str()),
        text_column(fields::SUBCLASS_CODE, rows, |r| r.subclass_code.as_str()),
        text_column(fields::SUBCLASS_NAME, rows, |r| r.subclass_name.as_str()),
    ])?)
}

fn text_column(name: &str, rows: &[Classification], get: fn(&Classification) -> &str) -> Column {
    Column::new(name.into(), rows.iter().map(get).collect::<Vec<&str>>())
}
