#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finstat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Financial statement pipeline.
//!
//! Write path: [`StatementDownloader`] batches identifiers, fetches the three
//! statements per batch, [`normalize`]s and [`merge_statements`], then replaces
//! the statement table once. [`IndustryCatalog`] keeps the classification
//! snapshot that scopes downloads and reads.
//!
//! Read path: [`StatementReader`] joins stored statements with the catalog,
//! [`PriceLookup`] supplies closing prices, and [`RatioEngine`] derives the
//! income, cost, efficiency and screening views.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use finstat::{FinstatConfig, IndustryCatalog, StatementDownloader};
//! use finstat::{CnInfoFetcher, DictionarySet, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> finstat::Result<()> {
//!     let config = FinstatConfig::load("finstat.toml")?;
//!     let fetcher = Arc::new(CnInfoFetcher::connect(config.provider.clone()).await?);
//!     let layout = Arc::new(config.layout.clone());
//!     let store = Arc::new(SqliteStore::new(&config.database.path)?);
//!
//!     let catalog = IndustryCatalog::new(fetcher.clone(), layout.clone(), store.clone());
//!     catalog.refresh().await?;
//!
//!     let codes = catalog.peer_codes("格力电器").await?;
//!     let dictionaries = Arc::new(DictionarySet::load(&config.dictionary.path)?);
//!     let report = StatementDownloader::new(fetcher, layout, dictionaries, store)
//!         .with_options(config.pipeline)
//!         .download(&codes)
//!         .await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use finstat_core::*;

// Stores
pub use finstat_store::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use finstat_store::SqliteStore;

// Provider
pub use finstat_cninfo::{CnInfoConfig, CnInfoFetcher, CnInfoLayout};

mod catalog;
pub use catalog::IndustryCatalog;

mod config;
pub use config::{
    CLIENT_ID_VAR, CLIENT_SECRET_VAR, DatabaseConfig, DictionaryConfig, FinstatConfig,
};

mod merge;
pub use merge::{Alignment, concat_batches, merge_statements};

mod normalize;
pub use normalize::normalize;

mod pipeline;
pub use pipeline::{
    DEFAULT_BATCH_LIMIT, DEFAULT_REPORT_PERIOD, PipelineOptions, RunReport, RunStatus,
    StatementDownloader,
};

mod price;
pub use price::{PriceLookup, PriceOptions};

/// Derived ratios and views.
pub mod ratios;
pub use ratios::RatioEngine;

mod reader;
pub use reader::{Selection, StatementReader, attach_prices};

#[cfg(test)]
mod testing;
