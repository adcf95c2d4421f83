//! Reading stored statements for a peer group.

use std::collections::HashMap;
use std::sync::Arc;

use finstat_core::{
    Filter, Result, TableStore, fields,
    tabular::{float_values, string_values},
};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::price::ensure_price_frame;

/// Which entities to read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Entities by name.
    Names(Vec<String>),
    /// Every entity of a subclass, largest revenue first.
    Subclass {
        /// Subclass name.
        name: String,
        /// Keep only the entities with the largest revenue.
        limit: Option<usize>,
    },
    /// Every entity of a class.
    Class(String),
}

impl Selection {
    fn catalog_filter(&self) -> Filter {
        match self {
            Self::Names(names) => Filter::any_of(fields::NAME, names.iter().cloned()),
            Self::Subclass { name, .. } => Filter::eq(fields::SUBCLASS_NAME, name.clone()),
            Self::Class(name) => Filter::eq(fields::CLASS_NAME, name.clone()),
        }
    }
}

/// Joins stored statements with the industry catalog.
///
/// Output rows carry every statement column plus `class_name` and
/// `subclass_name`; entities missing from the catalog are left out.
pub struct StatementReader {
    store: Arc<dyn TableStore>,
    statement_table: String,
    industry_table: String,
}

impl std::fmt::Debug for StatementReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementReader")
            .field("statement_table", &self.statement_table)
            .field("industry_table", &self.industry_table)
            .finish_non_exhaustive()
    }
}

impl StatementReader {
    /// Create a reader over the `statement` and `industry` tables.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            statement_table: "statement".to_string(),
            industry_table: "industry".to_string(),
        }
    }

    /// Read from other table names.
    #[must_use]
    pub fn with_tables(
        mut self,
        statement_table: impl Into<String>,
        industry_table: impl Into<String>,
    ) -> Self {
        self.statement_table = statement_table.into();
        self.industry_table = industry_table.into();
        self
    }

    /// Reads the statements of the selected entities.
    ///
    /// # Errors
    /// Returns an error if either table cannot be read.
    pub async fn read(&self, selection: &Selection) -> Result<DataFrame> {
        let catalog = self
            .store
            .query(&self.industry_table, &[selection.catalog_filter()])
            .await?;
        let codes = string_values(&catalog, fields::CODE)?;
        let classes = string_values(&catalog, fields::CLASS_NAME)?;
        let subclasses = string_values(&catalog, fields::SUBCLASS_NAME)?;

        let mut by_code: HashMap<String, (Option<String>, Option<String>)> = HashMap::new();
        for ((code, class), subclass) in codes.into_iter().zip(classes).zip(subclasses) {
            if let Some(code) = code {
                by_code.entry(code).or_insert((class, subclass));
            }
        }
        if by_code.is_empty() {
            warn!(?selection, "No catalog entries match the selection");
            return Ok(DataFrame::empty());
        }

        let statements = self
            .store
            .query(
                &self.statement_table,
                &[Filter::any_of(fields::CODE, by_code.keys().cloned())],
            )
            .await?;
        let mut joined = attach_classification(&statements, &by_code)?;

        if let Selection::Subclass { limit, .. } = selection {
            joined = largest_first(&joined, *limit)?;
        }
        debug!(rows = joined.height(), "Statements read");
        Ok(joined)
    }

    /// Reads the selection and joins each entity's closing price.
    ///
    /// # Errors
    /// Returns an error if the tables cannot be read or `prices` lacks
    /// `code` or `price`.
    pub async fn read_with_prices(&self, selection: &Selection, prices: &DataFrame) -> Result<DataFrame> {
        let statements = self.read(selection).await?;
        attach_prices(&statements, prices)
    }
}

fn attach_classification(
    statements: &DataFrame,
    by_code: &HashMap<String, (Option<String>, Option<String>)>,
) -> Result<DataFrame> {
    if statements.height() == 0 {
        return Ok(DataFrame::empty());
    }
    let codes = string_values(statements, fields::CODE)?;
    let mut keep = Vec::with_capacity(codes.len());
    let mut classes = Vec::new();
    let mut subclasses = Vec::new();
    for code in &codes {
        match code.as_ref().and_then(|c| by_code.get(c)) {
            Some((class, subclass)) => {
                keep.push(true);
                classes.push(class.clone());
                subclasses.push(subclass.clone());
            }
            None => keep.push(false),
        }
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let mut out = statements.filter(&mask)?;
    out.with_column(Column::new(fields::CLASS_NAME.into(), classes))?;
    out.with_column(Column::new(fields::SUBCLASS_NAME.into(), subclasses))?;
    Ok(out)
}

/// Sorts by revenue, largest first, and keeps the top `limit` entities.
fn largest_first(df: &DataFrame, limit: Option<usize>) -> Result<DataFrame> {
    if df.height() == 0 || !df.get_column_names().iter().any(|c| c.as_str() == fields::REVENUE) {
        return Ok(df.clone());
    }
    let sorted = df.sort(
        [fields::REVENUE],
        SortMultipleOptions::default()
            .with_order_descending(true)
            .with_nulls_last(true)
            .with_maintain_order(true),
    )?;
    let Some(limit) = limit else {
        return Ok(sorted);
    };

    let mut kept: Vec<String> = Vec::new();
    let mut mask = Vec::with_capacity(sorted.height());
    for name in string_values(&sorted, fields::NAME)? {
        let name = name.unwrap_or_default();
        if kept.contains(&name) {
            mask.push(true);
        } else if kept.len() < limit {
            kept.push(name);
            mask.push(true);
        } else {
            mask.push(false);
        }
    }
    Ok(sorted.filter(&BooleanChunked::from_slice("top".into(), &mask))?)
}

/// Adds a `price` column looked up by `code`; unmatched rows get null.
///
/// # Errors
/// Returns an error if `prices` lacks `code` or `price`.
pub fn attach_prices(statements: &DataFrame, prices: &DataFrame) -> Result<DataFrame> {
    if statements.height() == 0 {
        return Ok(statements.clone());
    }
    let mut by_code: HashMap<String, f64> = HashMap::new();
    if prices.height() > 0 {
        ensure_price_frame(prices)?;
        for (code, price) in string_values(prices, fields::CODE)?
            .into_iter()
            .zip(float_values(prices, fields::PRICE)?)
        {
            if let (Some(code), Some(price)) = (code, price) {
                by_code.entry(code).or_insert(price);
            }
        }
    }

    let column: Vec<Option<f64>> = string_values(statements, fields::CODE)?
        .iter()
        .map(|code| code.as_ref().and_then(|c| by_code.get(c).copied()))
        .collect();
    let mut out = statements.clone();
    out.with_column(Column::new(fields::PRICE.into(), column))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finstat_store::InMemoryStore;

    async fn seeded() -> StatementReader {
        let store = Arc::new(InMemoryStore::new());
        let industry = DataFrame::new(vec![
            Column::new("code".into(), vec!["A", "B", "C", "D"]),
            Column::new("name".into(), vec!["Alpha", "Beta", "Gamma", "Delta"]),
            Column::new("class_name".into(), vec!["制造业", "制造业", "制造业", "金融业"]),
            Column::new("subclass_name".into(), vec!["家电", "家电", "家电", "银行"]),
        ])
        .unwrap();
        let statement = DataFrame::new(vec![
            Column::new("code".into(), vec!["A", "B", "C", "D", "A"]),
            Column::new("name".into(), vec!["Alpha", "Beta", "Gamma", "Delta", "Alpha"]),
            Column::new(
                "report_period".into(),
                vec!["2018-12-31", "2018-12-31", "2018-12-31", "2018-12-31", "2017-12-31"],
            ),
            Column::new("revenue".into(), vec![Some(10.0), Some(30.0), None, Some(99.0), Some(8.0)]),
        ])
        .unwrap();
        store.replace("industry", &industry).await.unwrap();
        store.replace("statement", &statement).await.unwrap();
        StatementReader::new(store)
    }

    fn names(df: &DataFrame) -> Vec<String> {
        string_values(df, "name").unwrap().into_iter().flatten().collect()
    }

    #[tokio::test]
    async fn subclass_read_sorts_by_revenue() {
        let reader = seeded().await;
        let out = reader
            .read(&Selection::Subclass {
                name: "家电".to_string(),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["Beta", "Alpha", "Alpha", "Gamma"]);
        assert_eq!(
            string_values(&out, "subclass_name").unwrap()[0],
            Some("家电".to_string())
        );

        let top = reader
            .read(&Selection::Subclass {
                name: "家电".to_string(),
                limit: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(names(&top), vec!["Beta", "Alpha", "Alpha"]);
    }

    #[tokio::test]
    async fn names_and_class_reads() {
        let reader = seeded().await;
        let out = reader
            .read(&Selection::Names(vec!["Delta".to_string(), "Gamma".to_string()]))
            .await
            .unwrap();
        assert_eq!(names(&out), vec!["Gamma", "Delta"]);

        let bank = reader.read(&Selection::Class("金融业".to_string())).await.unwrap();
        assert_eq!(names(&bank), vec!["Delta"]);

        let none = reader.read(&Selection::Class("不存在".to_string())).await.unwrap();
        assert_eq!(none.height(), 0);
    }

    #[tokio::test]
    async fn joins_prices_by_code() {
        let reader = seeded().await;
        let prices = DataFrame::new(vec![
            Column::new("code".into(), vec!["A", "C"]),
            Column::new("price".into(), vec![12.5, 3.0]),
        ])
        .unwrap();
        let out = reader
            .read_with_prices(&Selection::Class("制造业".to_string()), &prices)
            .await
            .unwrap();
        assert_eq!(
            float_values(&out, "price").unwrap(),
            vec![Some(12.5), None, Some(3.0), Some(12.5)]
        );
    }
}
