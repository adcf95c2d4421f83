#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finstat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the finstat statement pipeline.
//!
//! - [`RemoteFetcher`](provider::RemoteFetcher) - Tabular requests against a provider
//! - [`ProviderLayout`](provider::ProviderLayout) - Which endpoint answers what
//! - [`TableStore`](store::TableStore) - Whole-table replace and filtered reads
//! - [`batches`](batch::batches) - Fixed-size batching of identifier lists
//! - [`DictionarySet`](dictionary::DictionarySet) - Provider code to domain name mappings

/// Fixed-size batching.
pub mod batch;
/// Name dictionaries.
pub mod dictionary;
/// Error types for pipeline operations.
pub mod error;
/// Domain column names.
pub mod fields;
/// Reporting period labels.
pub mod period;
/// Provider traits.
pub mod provider;
/// Store trait and filters.
pub mod store;
/// Record and DataFrame helpers.
pub mod tabular;
/// Core domain types.
pub mod types;

// Re-export commonly used items at crate root
pub use batch::{Batches, batches};
pub use dictionary::{DictionarySet, FieldMapping, NameDictionary};
pub use error::{FinstatError, Result};
pub use period::{FiscalPeriod, period_label};
pub use provider::{DataProvider, FormParams, ProviderLayout, RemoteFetcher, Request, form};
pub use store::{Filter, TableStore};
pub use types::{Classification, StatementKind, WriteOutcome};
