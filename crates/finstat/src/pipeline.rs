//! Batched statement download.

use std::sync::Arc;

use finstat_core::{
    DictionarySet, FinstatError, ProviderLayout, RemoteFetcher, Result, StatementKind, TableStore,
    WriteOutcome, batches,
};
use futures::{StreamExt, stream};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::merge::{Alignment, concat_batches, merge_statements};
use crate::normalize::normalize;

/// Default number of identifiers per provider request.
pub const DEFAULT_BATCH_LIMIT: usize = 50;

/// Default reporting period.
pub const DEFAULT_REPORT_PERIOD: &str = "2018-12-31";

/// Tuning of a statement download run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Maximum identifiers per request.
    pub batch_limit: usize,
    /// Batches in flight at once.
    pub concurrency: usize,
    /// Period used when a run names none.
    pub report_period: String,
    /// Alignment of the three statements within a batch.
    pub alignment: Alignment,
    /// Table receiving merged statements.
    pub statement_table: String,
    /// Table receiving the industry catalog.
    pub industry_table: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            concurrency: 4,
            report_period: DEFAULT_REPORT_PERIOD.to_string(),
            alignment: Alignment::default(),
            statement_table: "statement".to_string(),
            industry_table: "industry".to_string(),
        }
    }
}

/// Final status of a run that wrote data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Every batch succeeded.
    Complete,
    /// Some batches failed and contributed nothing.
    Partial,
}

/// Summary of a statement download run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Units of work requested, one per batch and period.
    pub batches: usize,
    /// Units of work that failed.
    pub failed_batches: usize,
    /// Result of the table replace.
    pub outcome: WriteOutcome,
    /// Run status.
    pub status: RunStatus,
}

impl RunReport {
    /// Rows written to the statement table.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.outcome.rows()
    }
}

/// Downloads statements for a list of identifiers and persists the merged result.
///
/// Each batch of identifiers is fetched from the three statement endpoints,
/// normalized, and merged. Batches run concurrently up to
/// [`PipelineOptions::concurrency`]; their results are stacked in request order
/// and written with a single replace.
pub struct StatementDownloader {
    fetcher: Arc<dyn RemoteFetcher>,
    layout: Arc<dyn ProviderLayout>,
    dictionaries: Arc<DictionarySet>,
    store: Arc<dyn TableStore>,
    options: PipelineOptions,
}

impl std::fmt::Debug for StatementDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementDownloader")
            .field("fetcher", &self.fetcher.name())
            .field("layout", &self.layout)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl StatementDownloader {
    /// Create a downloader with default options.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        layout: Arc<dyn ProviderLayout>,
        dictionaries: Arc<DictionarySet>,
        store: Arc<dyn TableStore>,
    ) -> Self {
        Self {
            fetcher,
            layout,
            dictionaries,
            store,
            options: PipelineOptions::default(),
        }
    }

    /// Replace the run options.
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the run options.
    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Download the configured report period for `codes`.
    ///
    /// # Errors
    /// See [`download_periods`](Self::download_periods).
    pub async fn download(&self, codes: &[String]) -> Result<RunReport> {
        let period = self.options.report_period.clone();
        self.download_periods(codes, &[period]).await
    }

    /// Download every period for `codes` and replace the statement table.
    ///
    /// Failed batches are logged and skipped; the run then ends with
    /// [`RunStatus::Partial`].
    ///
    /// # Errors
    /// - [`FinstatError::Auth`] as soon as any batch hits an authentication failure
    /// - [`FinstatError::AllBatchesFailed`] if no batch succeeded
    /// - [`FinstatError::EmptyRun`] if batches succeeded but returned no rows
    /// - [`FinstatError::InvalidParameter`] for a zero batch limit or no period
    #[instrument(skip(self, codes, periods), fields(codes = codes.len(), periods = periods.len()))]
    pub async fn download_periods(&self, codes: &[String], periods: &[String]) -> Result<RunReport> {
        if periods.is_empty() {
            return Err(FinstatError::InvalidParameter(
                "at least one report period is required".to_string(),
            ));
        }

        let chunks = batches(codes, self.options.batch_limit)?;
        let units: Vec<(&[String], &str)> = periods
            .iter()
            .flat_map(|period| chunks.clone().map(move |batch| (batch, period.as_str())))
            .collect();
        let total = units.len();
        if total == 0 {
            info!("No identifiers to download");
            return Err(FinstatError::EmptyRun { batches: 0 });
        }

        let results = stream::iter(units.into_iter().enumerate())
            .map(|(index, (batch, period))| self.download_batch(index, batch, period))
            .buffered(self.options.concurrency.max(1));
        let mut results = std::pin::pin!(results);

        let mut frames = Vec::with_capacity(total);
        let mut failed = 0;
        while let Some(result) = results.next().await {
            match result {
                Ok(frame) => frames.push(frame),
                Err(e) if e.is_fatal() => {
                    warn!(error = %e, "Aborting run");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping failed batch");
                    failed += 1;
                }
            }
        }

        if failed == total {
            return Err(FinstatError::AllBatchesFailed { batches: total });
        }

        let merged = concat_batches(frames)?;
        if merged.height() == 0 {
            info!(batches = total, "No statement rows returned");
            return Err(FinstatError::EmptyRun { batches: total });
        }

        let outcome = self
            .store
            .replace(&self.options.statement_table, &merged)
            .await?;
        let status = if failed == 0 {
            RunStatus::Complete
        } else {
            RunStatus::Partial
        };
        info!(
            batches = total,
            failed_batches = failed,
            rows = outcome.rows(),
            ?status,
            "Statements saved"
        );

        Ok(RunReport {
            batches: total,
            failed_batches: failed,
            outcome,
            status,
        })
    }

    async fn download_batch(&self, index: usize, codes: &[String], period: &str) -> Result<DataFrame> {
        let mut normalized = Vec::with_capacity(StatementKind::ALL.len());
        for kind in StatementKind::ALL {
            let request = self.layout.statements(kind, codes, period);
            let raw = self.fetcher.fetch(&request.endpoint, &request.params).await?;
            normalized.push(normalize(&raw, self.dictionaries.get(kind), kind.as_str())?);
        }

        let merged = merge_statements(
            &normalized[0],
            &normalized[1],
            &normalized[2],
            self.options.alignment,
        )?;
        debug!(batch = index, period, rows = merged.height(), "Batch merged");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFetcher, dictionaries, statement_payload};
    use finstat_cninfo::CnInfoLayout;
    use finstat_core::Filter;
    use finstat_core::tabular::{float_values, string_values};
    use finstat_store::InMemoryStore;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn downloader(fetcher: ScriptedFetcher, store: Arc<InMemoryStore>, limit: usize) -> StatementDownloader {
        StatementDownloader::new(
            Arc::new(fetcher),
            Arc::new(CnInfoLayout::default()),
            Arc::new(dictionaries()),
            store,
        )
        .with_options(PipelineOptions {
            batch_limit: limit,
            concurrency: 2,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn downloads_every_batch_and_period() {
        let store = Arc::new(InMemoryStore::new());
        let fetcher = ScriptedFetcher::statements(statement_payload);
        let run = downloader(fetcher, store.clone(), 2);

        let periods = vec!["2017-12-31".to_string(), "2018-12-31".to_string()];
        let report = run
            .download_periods(&codes(&["A", "B", "C", "D", "E"]), &periods)
            .await
            .unwrap();

        assert_eq!(report.batches, 6);
        assert_eq!(report.failed_batches, 0);
        assert_eq!(report.status, RunStatus::Complete);
        assert_eq!(report.rows(), 10);

        let stored = store.query("statement", &[]).await.unwrap();
        assert_eq!(stored.height(), 10);
        let leading: Vec<&str> = stored
            .get_column_names()
            .iter()
            .take(3)
            .map(|c| c.as_str())
            .collect();
        assert_eq!(leading, vec!["code", "name", "report_period"]);
    }

    #[tokio::test]
    async fn failed_batch_gives_partial_run() {
        let store = Arc::new(InMemoryStore::new());
        let fetcher = ScriptedFetcher::statements(statement_payload).failing_for("C");
        let run = downloader(fetcher, store.clone(), 2);

        let report = run.download(&codes(&["A", "B", "C", "D", "E"])).await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.status, RunStatus::Partial);

        let stored = store.query("statement", &[]).await.unwrap();
        assert_eq!(
            string_values(&stored, "code").unwrap(),
            vec![Some("A".to_string()), Some("B".to_string()), Some("E".to_string())]
        );
    }

    #[tokio::test]
    async fn all_batches_failing_is_distinguished_from_no_data() {
        let store = Arc::new(InMemoryStore::new());
        let fetcher = ScriptedFetcher::statements(statement_payload).failing_for("A");
        let err = downloader(fetcher, store.clone(), 2)
            .download(&codes(&["A"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FinstatError::AllBatchesFailed { batches: 1 }));

        let fetcher = ScriptedFetcher::statements(|_, _| DataFrame::empty());
        let err = downloader(fetcher, store.clone(), 2)
            .download(&codes(&["A", "B", "C"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FinstatError::EmptyRun { batches: 2 }));
        assert!(!store.contains("statement").await.unwrap());
    }

    #[tokio::test]
    async fn empty_income_statement_persists_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let income = CnInfoLayout::default().income_endpoint;
        let fetcher = ScriptedFetcher::statements(statement_payload).empty_at(&income);
        let err = downloader(fetcher, store.clone(), 2)
            .download(&codes(&["A", "B", "C"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FinstatError::EmptyRun { batches: 2 }));
        assert!(!store.contains("statement").await.unwrap());
    }

    #[tokio::test]
    async fn auth_failure_aborts_the_run() {
        let store = Arc::new(InMemoryStore::new());
        let fetcher = ScriptedFetcher::statements(statement_payload).unauthenticated();
        let err = downloader(fetcher, store.clone(), 2)
            .download(&codes(&["A", "B", "C"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FinstatError::Auth(_)));
        assert!(!store.contains("statement").await.unwrap());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn repeated_runs_replace_the_sqlite_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(finstat_store::SqliteStore::new(dir.path().join("finstat.sqlite3")).unwrap());
        let run = StatementDownloader::new(
            Arc::new(ScriptedFetcher::statements(statement_payload)),
            Arc::new(CnInfoLayout::default()),
            Arc::new(dictionaries()),
            store.clone(),
        );

        run.download(&codes(&["A", "B", "C"])).await.unwrap();
        let report = run.download(&codes(&["A", "B", "C"])).await.unwrap();
        assert_eq!(report.rows(), 3);

        let stored = store
            .query("statement", &[Filter::eq("code", "B")])
            .await
            .unwrap();
        assert_eq!(stored.height(), 1);
        assert_eq!(float_values(&stored, "revenue").unwrap(), vec![Some(100.0)]);
        assert_eq!(float_values(&stored, "total_assets").unwrap(), vec![Some(500.0)]);
    }

    #[tokio::test]
    async fn zero_batch_limit_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let fetcher = ScriptedFetcher::statements(statement_payload);
        let err = downloader(fetcher, store, 0)
            .download(&codes(&["A"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FinstatError::InvalidParameter(_)));
    }
}
