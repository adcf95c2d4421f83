//! Closing prices with rollback over non-trading days.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use finstat_core::{FinstatError, ProviderLayout, RemoteFetcher, Result, batches, fields};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::merge::concat_batches;
use crate::normalize::normalize;
use crate::pipeline::DEFAULT_BATCH_LIMIT;

/// Price lookup settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceOptions {
    /// Calendar days to step back when a day has no quotes.
    pub max_rollback_days: u32,
    /// Maximum identifiers per quote request.
    pub batch_limit: usize,
}

impl Default for PriceOptions {
    fn default() -> Self {
        Self {
            max_rollback_days: 10,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// Fetches one closing price per entity.
///
/// The requested day is tried first. While the provider answers with no quotes
/// (weekends, holidays) the lookup steps back one calendar day, at most
/// [`PriceOptions::max_rollback_days`] times.
pub struct PriceLookup {
    fetcher: Arc<dyn RemoteFetcher>,
    layout: Arc<dyn ProviderLayout>,
    options: PriceOptions,
}

impl std::fmt::Debug for PriceLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceLookup")
            .field("fetcher", &self.fetcher.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl PriceLookup {
    /// Create a lookup with default options.
    #[must_use]
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, layout: Arc<dyn ProviderLayout>) -> Self {
        Self {
            fetcher,
            layout,
            options: PriceOptions::default(),
        }
    }

    /// Replace the lookup options.
    #[must_use]
    pub fn with_options(mut self, options: PriceOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns `(code, price)` rows for the latest trading day on or before `date`.
    ///
    /// The result is empty if no day within the rollback bound has quotes.
    ///
    /// # Errors
    /// Returns an error if a request fails or the quotes lack the expected fields.
    pub async fn closing_prices(&self, codes: &[String], date: NaiveDate) -> Result<DataFrame> {
        if codes.is_empty() {
            return Ok(DataFrame::empty());
        }
        let dictionary = self.layout.quote_dictionary();

        for offset in 0..=self.options.max_rollback_days {
            let Some(day) = date.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };

            let mut frames = Vec::new();
            for batch in batches(codes, self.options.batch_limit)? {
                let request = self.layout.daily_quotes(batch, day);
                let raw = self.fetcher.fetch(&request.endpoint, &request.params).await?;
                frames.push(normalize(&raw, &dictionary, "quote")?);
            }

            let quotes = concat_batches(frames)?;
            if quotes.height() > 0 {
                info!(%day, rows = quotes.height(), "Closing prices found");
                return Ok(quotes.select([fields::CODE, fields::PRICE])?);
            }
            debug!(%day, "No quotes, stepping back one day");
        }

        warn!(
            %date,
            max_rollback_days = self.options.max_rollback_days,
            "No quotes within rollback bound"
        );
        Ok(DataFrame::empty())
    }
}

/// Validates that a frame carries `(code, price)`.
pub(crate) fn ensure_price_frame(prices: &DataFrame) -> Result<()> {
    let absent = finstat_core::tabular::missing_columns(prices, [fields::CODE, fields::PRICE]);
    if absent.is_empty() {
        Ok(())
    } else {
        Err(FinstatError::MissingColumns {
            table: "price".to_string(),
            columns: absent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;
    use finstat_cninfo::CnInfoLayout;
    use finstat_core::tabular::float_values;
    use polars::prelude::*;

    fn quotes() -> DataFrame {
        DataFrame::new(vec![
            Column::new("SECCODE".into(), vec!["000651", "000333"]),
            Column::new("F002N".into(), vec![45.2, 52.8]),
        ])
        .unwrap()
    }

    fn lookup(fetcher: ScriptedFetcher, max_rollback_days: u32) -> (Arc<ScriptedFetcher>, PriceLookup) {
        let fetcher = Arc::new(fetcher);
        let lookup = PriceLookup::new(fetcher.clone(), Arc::new(CnInfoLayout::default()))
            .with_options(PriceOptions {
                max_rollback_days,
                ..Default::default()
            });
        (fetcher, lookup)
    }

    fn codes() -> Vec<String> {
        vec!["000651".to_string(), "000333".to_string()]
    }

    #[tokio::test]
    async fn steps_back_to_last_trading_day() {
        // 2019-05-04 is a Saturday; Friday has quotes.
        let fetcher = ScriptedFetcher::statements(|_, _| DataFrame::empty())
            .with_quotes("2019-05-03", quotes());
        let (fetcher, lookup) = lookup(fetcher, 5);

        let date = NaiveDate::from_ymd_opt(2019, 5, 4).unwrap();
        let prices = lookup.closing_prices(&codes(), date).await.unwrap();
        assert_eq!(float_values(&prices, "price").unwrap(), vec![Some(45.2), Some(52.8)]);
        assert_eq!(fetcher.calls().len(), 2);
        ensure_price_frame(&prices).unwrap();
    }

    #[tokio::test]
    async fn exhausted_rollback_gives_empty_table() {
        let fetcher = ScriptedFetcher::statements(|_, _| DataFrame::empty())
            .with_quotes("2019-04-20", quotes());
        let (fetcher, lookup) = lookup(fetcher, 3);

        let date = NaiveDate::from_ymd_opt(2019, 5, 4).unwrap();
        let prices = lookup.closing_prices(&codes(), date).await.unwrap();
        assert_eq!(prices.height(), 0);
        assert_eq!(fetcher.calls().len(), 4);
        assert!(ensure_price_frame(&prices).is_err());
    }
}
