#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finstat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! CNINFO data provider.
//!
//! This crate implements the finstat-core traits for the
//! [CNINFO](http://webapi.cninfo.com.cn/) data API.
//!
//! # Usage
//!
//! ```rust,ignore
//! use finstat_cninfo::{CnInfoConfig, CnInfoFetcher, CnInfoLayout};
//! use finstat_core::{ProviderLayout, RemoteFetcher, StatementKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CnInfoConfig::with_credentials("client_id", "client_secret");
//!     let fetcher = CnInfoFetcher::connect(config).await?;
//!
//!     let request = CnInfoLayout::default().statements(
//!         StatementKind::Income,
//!         &["000651".to_string()],
//!         "2018-12-31",
//!     );
//!     let income = fetcher.fetch(&request.endpoint, &request.params).await?;
//!     println!("{income}");
//!
//!     Ok(())
//! }
//! ```

mod layout;

pub use layout::CnInfoLayout;

use async_trait::async_trait;
use finstat_core::{
    DataProvider, FinstatError, FormParams, RemoteFetcher, Result,
    tabular::{Record, records_to_frame},
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Base URL for the CNINFO web API.
pub const CNINFO_BASE_URL: &str = "http://webapi.cninfo.com.cn";

/// Token endpoint, relative to the base URL.
const TOKEN_ENDPOINT: &str = "api-cloud-platform/oauth2/token";

/// Keyword holding the token in the token response.
const TOKEN_KEYWORD: &str = "access_token";

/// Keyword holding the rows in data responses.
pub const RESULT_KEYWORD: &str = "records";

/// Provider name used in errors and logs.
const PROVIDER: &str = "CNINFO";

/// Connection settings for [`CnInfoFetcher`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CnInfoConfig {
    /// API base URL.
    pub base_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after a transport failure.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds; doubles per attempt.
    pub retry_base_delay_ms: u64,
    /// Upper bound on a single backoff delay, in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Minimum interval between two requests, in milliseconds.
    pub min_request_interval_ms: u64,
}

impl Default for CnInfoConfig {
    fn default() -> Self {
        Self {
            base_url: CNINFO_BASE_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            min_request_interval_ms: 200,
        }
    }
}

impl fmt::Debug for CnInfoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CnInfoConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("min_request_interval_ms", &self.min_request_interval_ms)
            .finish()
    }
}

impl CnInfoConfig {
    /// Default settings with the given credentials.
    #[must_use]
    pub fn with_credentials(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Default::default()
        }
    }

    /// Backoff delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.retry_base_delay_ms
                .saturating_mul(factor)
                .min(self.retry_max_delay_ms),
        )
    }
}

/// Rate limiter to keep a minimum interval between requests.
#[derive(Debug)]
struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    const fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// CNINFO data fetcher.
///
/// Holds the HTTP client and the access token. The token is acquired once by
/// [`CnInfoFetcher::connect`]; while no token is held every fetch fails with
/// [`FinstatError::Auth`] without touching the network.
pub struct CnInfoFetcher {
    client: reqwest::Client,
    config: CnInfoConfig,
    token: RwLock<Option<String>>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl fmt::Debug for CnInfoFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CnInfoFetcher")
            .field("config", &self.config)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl CnInfoFetcher {
    /// Create a fetcher without acquiring a token.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CnInfoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FinstatError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a fetcher with a custom HTTP client, without acquiring a token.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: CnInfoConfig) -> Self {
        let min_interval = Duration::from_millis(config.min_request_interval_ms);
        Self {
            client,
            config,
            token: RwLock::new(None),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(min_interval))),
        }
    }

    /// Create a fetcher and acquire its token.
    ///
    /// A failed token request is logged, not returned: the fetcher is still
    /// built and every later fetch fails fast with [`FinstatError::Auth`]
    /// until [`authenticate`](Self::authenticate) succeeds.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub async fn connect(config: CnInfoConfig) -> Result<Self> {
        let fetcher = Self::new(config)?;
        if let Err(e) = fetcher.authenticate().await {
            warn!(error = %e, "Token acquisition failed");
        }
        Ok(fetcher)
    }

    /// Acquire a fresh access token, replacing any previous one.
    ///
    /// # Errors
    /// Returns [`FinstatError::Auth`] if the provider refuses the credentials
    /// or answers without a token.
    pub async fn authenticate(&self) -> Result<()> {
        let params = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), self.config.client_id.clone()),
            ("client_secret".to_string(), self.config.client_secret.clone()),
        ];

        let outcome = match self.post(TOKEN_ENDPOINT, &params).await {
            Ok(payload) => payload
                .get(TOKEN_KEYWORD)
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .ok_or_else(|| FinstatError::Auth(format!("{PROVIDER}: no token in {payload}"))),
            Err(FinstatError::Auth(msg)) => Err(FinstatError::Auth(msg)),
            Err(e) => Err(FinstatError::Auth(format!("{PROVIDER}: {e}"))),
        };

        let mut token = self.token.write().await;
        match outcome {
            Ok(t) => {
                *token = Some(t);
                info!("Token acquired");
                Ok(())
            }
            Err(e) => {
                *token = None;
                Err(e)
            }
        }
    }

    /// Returns true if a token is currently held.
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Build the full URL of an endpoint.
    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// POST a form and parse the JSON answer, retrying transport failures.
    async fn post(&self, endpoint: &str, params: &FormParams) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.post_once(endpoint, params).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        endpoint,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn post_once(&self, endpoint: &str, params: &FormParams) -> Result<Value> {
        self.rate_limiter.lock().await.wait().await;

        debug!("CNINFO request: {}", endpoint);
        let response = self
            .client
            .post(self.url(endpoint))
            .form(params)
            .send()
            .await
            .map_err(|e| FinstatError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FinstatError::Auth(format!("{PROVIDER}: HTTP {status}")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FinstatError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after: None,
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FinstatError::Transport(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FinstatError::Transport(e.to_string()))?;

        serde_json::from_str(&text).map_err(|_| FinstatError::Schema {
            endpoint: endpoint.to_string(),
            keyword: RESULT_KEYWORD.to_string(),
            payload: text,
        })
    }
}

/// Extracts the rows stored under `keyword` in a provider payload.
///
/// # Errors
/// Returns [`FinstatError::Schema`] if the keyword is absent or does not hold
/// a list of objects.
pub fn extract_records(endpoint: &str, payload: &Value, keyword: &str) -> Result<Vec<Record>> {
    let schema_failure = || FinstatError::Schema {
        endpoint: endpoint.to_string(),
        keyword: keyword.to_string(),
        payload: payload.to_string(),
    };

    payload
        .get(keyword)
        .and_then(Value::as_array)
        .ok_or_else(schema_failure)?
        .iter()
        .map(|row| row.as_object().cloned().ok_or_else(schema_failure))
        .collect()
}

impl DataProvider for CnInfoFetcher {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn description(&self) -> &str {
        "CNINFO - Shenzhen Securities Information financial data API"
    }
}

#[async_trait]
impl RemoteFetcher for CnInfoFetcher {
    async fn fetch(&self, endpoint: &str, params: &FormParams) -> Result<DataFrame> {
        let token = self
            .token
            .read()
            .await
            .clone()
            .ok_or_else(|| FinstatError::Auth(format!("{PROVIDER}: no access token")))?;

        let mut form = params.clone();
        form.push(("access_token".to_string(), token));

        let payload = match self.post(endpoint, &form).await {
            Ok(payload) => payload,
            Err(FinstatError::Schema { payload, .. }) => {
                warn!(endpoint, payload = %payload, "Unexpected payload, treating as empty");
                return Ok(DataFrame::empty());
            }
            Err(e) => return Err(e),
        };

        match extract_records(endpoint, &payload, RESULT_KEYWORD) {
            Ok(records) => {
                debug!(endpoint, rows = records.len(), "CNINFO response");
                records_to_frame(&records)
            }
            Err(FinstatError::Schema { payload, .. }) => {
                warn!(endpoint, payload = %payload, "Unexpected payload, treating as empty");
                Ok(DataFrame::empty())
            }
            Err(e) => Err(e),
        }
    }
}
