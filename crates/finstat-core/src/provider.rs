//! Provider trait for fetching tabular data from a remote endpoint.
//!
//! The pipeline never talks HTTP directly. It asks a [`RemoteFetcher`] for one
//! endpoint at a time and receives a DataFrame of raw provider columns.

use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::fmt::Debug;

use crate::{dictionary::NameDictionary, error::Result, types::StatementKind};

/// Form fields sent with a request, in insertion order.
pub type FormParams = Vec<(String, String)>;

/// Base trait for all remote data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "CNINFO").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Provider capable of answering tabular requests.
///
/// Implementations issue one logical request per call. A response lacking the
/// expected result keyword is logged and surfaces as an empty DataFrame, so
/// callers treat "no data" and "unexpected payload" the same way.
#[async_trait]
pub trait RemoteFetcher: DataProvider {
    /// Fetches the records of `endpoint` for the given form fields.
    ///
    /// # Errors
    /// Returns [`FinstatError::Auth`](crate::FinstatError::Auth) when no valid
    /// token is held, and [`FinstatError::Transport`](crate::FinstatError::Transport)
    /// when the call fails after retries.
    async fn fetch(&self, endpoint: &str, params: &FormParams) -> Result<DataFrame>;
}

/// One logical request: an endpoint path and its form fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Endpoint path relative to the provider base URL.
    pub endpoint: String,
    /// Form fields.
    pub params: FormParams,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, params: FormParams) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
        }
    }
}

/// Request layout of a statement provider.
///
/// Separates which endpoint answers what from how requests travel, so the
/// pipeline can run against any [`RemoteFetcher`].
pub trait ProviderLayout: Send + Sync + Debug {
    /// Request for one statement type, a batch of identifiers and one period.
    fn statements(&self, kind: StatementKind, codes: &[String], period: &str) -> Request;

    /// Request for the full industry classification snapshot.
    fn classification(&self) -> Request;

    /// Dictionary renaming classification fields to catalog columns.
    fn classification_dictionary(&self) -> NameDictionary;

    /// Request for daily quotes of a batch of identifiers on one trading day.
    fn daily_quotes(&self, codes: &[String], date: NaiveDate) -> Request;

    /// Dictionary renaming quote fields to `code` and `price`.
    fn quote_dictionary(&self) -> NameDictionary;
}

/// Builds form parameters from string pairs.
#[must_use]
pub fn form<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> FormParams {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
