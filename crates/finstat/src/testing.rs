//! Scripted provider used by the pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use finstat_core::{
    DataProvider, DictionarySet, FinstatError, FormParams, RemoteFetcher, Result,
};
use polars::prelude::*;

const CLASSIFICATION_ENDPOINT: &str = "api/stock/p_public0004";
const QUOTE_ENDPOINT: &str = "api/stock/p_stock2402";

const DICTIONARIES: &str = r#"
[[income]]
code = "SECCODE"
name = "code"
[[income]]
code = "SECNAME"
name = "name"
[[income]]
code = "ENDDATE"
name = "report_period"
[[income]]
code = "DECLAREDATE"
name = "announcement_date"
[[income]]
code = "F035N"
name = "revenue"
[[income]]
code = "F036N"
name = "total_cost"

[[balance]]
code = "SECCODE"
name = "code"
[[balance]]
code = "SECNAME"
name = "name"
[[balance]]
code = "ENDDATE"
name = "report_period"
[[balance]]
code = "DECLAREDATE"
name = "announcement_date"
[[balance]]
code = "F120N"
name = "total_assets"

[[cash_flow]]
code = "SECCODE"
name = "code"
[[cash_flow]]
code = "SECNAME"
name = "name"
[[cash_flow]]
code = "ENDDATE"
name = "report_period"
[[cash_flow]]
code = "F039N"
name = "operating_cash_flow"
"#;

/// Dictionaries matching [`statement_payload`].
pub(crate) fn dictionaries() -> DictionarySet {
    DictionarySet::from_toml_str(DICTIONARIES).unwrap()
}

/// Raw provider rows for every code of a batch: revenue 100, total cost 80.
pub(crate) fn statement_payload(codes: &[String], period: &str) -> DataFrame {
    let n = codes.len();
    DataFrame::new(vec![
        Column::new("SECCODE".into(), codes.to_vec()),
        Column::new(
            "SECNAME".into(),
            codes.iter().map(|c| format!("Co{c}")).collect::<Vec<_>>(),
        ),
        Column::new("ENDDATE".into(), vec![period; n]),
        Column::new("DECLAREDATE".into(), vec!["2019-04-30"; n]),
        Column::new("F035N".into(), vec![100.0; n]),
        Column::new("F036N".into(), vec![80.0; n]),
        Column::new("F120N".into(), vec![500.0; n]),
        Column::new("F039N".into(), vec![12.0; n]),
    ])
    .unwrap()
}

/// Fetcher answering from fixed data instead of the network.
pub(crate) struct ScriptedFetcher {
    statements: fn(&[String], &str) -> DataFrame,
    classification: DataFrame,
    quotes: HashMap<String, DataFrame>,
    failing_code: Option<String>,
    empty_endpoint: Option<String>,
    authenticated: bool,
    calls: Mutex<Vec<(String, FormParams)>>,
}

impl ScriptedFetcher {
    pub(crate) fn statements(statements: fn(&[String], &str) -> DataFrame) -> Self {
        Self {
            statements,
            classification: DataFrame::empty(),
            quotes: HashMap::new(),
            failing_code: None,
            empty_endpoint: None,
            authenticated: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn classification(classification: DataFrame) -> Self {
        Self {
            classification,
            ..Self::statements(|_, _| DataFrame::empty())
        }
    }

    pub(crate) fn with_quotes(mut self, day: &str, quotes: DataFrame) -> Self {
        self.quotes.insert(day.to_string(), quotes);
        self
    }

    /// Every request whose batch contains `code` fails with a transport error.
    pub(crate) fn failing_for(mut self, code: &str) -> Self {
        self.failing_code = Some(code.to_string());
        self
    }

    /// `endpoint` answers with a frame without columns.
    pub(crate) fn empty_at(mut self, endpoint: &str) -> Self {
        self.empty_endpoint = Some(endpoint.to_string());
        self
    }

    pub(crate) fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, FormParams)> {
        self.calls.lock().unwrap().clone()
    }
}

impl std::fmt::Debug for ScriptedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedFetcher")
            .field("failing_code", &self.failing_code)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

fn param<'a>(params: &'a FormParams, key: &str) -> &'a str {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map_or("", |(_, v)| v.as_str())
}

impl DataProvider for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    fn description(&self) -> &str {
        "Fixed responses for tests"
    }
}

#[async_trait]
impl RemoteFetcher for ScriptedFetcher {
    async fn fetch(&self, endpoint: &str, params: &FormParams) -> Result<DataFrame> {
        if !self.authenticated {
            return Err(FinstatError::Auth("scripted: no access token".to_string()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), params.clone()));

        if self.empty_endpoint.as_deref() == Some(endpoint) {
            return Ok(DataFrame::empty());
        }
        if endpoint == CLASSIFICATION_ENDPOINT {
            return Ok(self.classification.clone());
        }

        let codes: Vec<String> = param(params, "scode")
            .split(',')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(failing) = &self.failing_code {
            if codes.contains(failing) {
                return Err(FinstatError::Transport("connection reset".to_string()));
            }
        }

        if endpoint == QUOTE_ENDPOINT {
            return Ok(self
                .quotes
                .get(param(params, "sdate"))
                .cloned()
                .unwrap_or_else(DataFrame::empty));
        }

        Ok((self.statements)(&codes, param(params, "rdate")))
    }
}
