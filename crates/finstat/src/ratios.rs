//! Derived ratios and the four dashboard views.
//!
//! Every ratio is a quotient guarded against a zero or null denominator: such
//! rows get a null ratio instead of an infinity. Views keep the input row
//! order and lead with `name`, `period_label` and `report_period`.

use finstat_core::{
    FinstatError, Result, fields, period_label,
    tabular::{has_columns, null_float_column, string_values},
};
use polars::prelude::*;
use tracing::{debug, warn};

/// Short fiscal label of the report period.
pub const PERIOD_LABEL: &str = "period_label";
/// Revenue minus total cost.
pub const GROSS_PROFIT: &str = "gross_profit";
/// Gross profit over revenue.
pub const GROSS_MARGIN: &str = "gross_margin";
/// Operating profit over revenue.
pub const OPERATING_MARGIN: &str = "operating_margin";
/// Total profit over revenue.
pub const PRETAX_MARGIN: &str = "pretax_margin";
/// Net profit over revenue.
pub const NET_MARGIN: &str = "net_margin";
/// Parent net profit over revenue.
pub const SHAREHOLDER_NET_MARGIN: &str = "shareholder_net_margin";
/// Parent net profit over total assets.
pub const ROA: &str = "roa";
/// Parent net profit over total equity.
pub const ROE: &str = "roe";
/// Parent net profit over share capital.
pub const EPS: &str = "eps";
/// Price over earnings per share.
pub const PE: &str = "pe";
/// Revenue minus total cost, shown as a share of revenue.
pub const RESIDUAL_PROFIT: &str = "residual_profit";
/// Total cost not covered by the itemized costs.
pub const OTHER_COSTS: &str = "other_costs";

/// Amount columns the ratios read.
const SOURCE_FIELDS: [&str; 15] = [
    fields::REVENUE,
    fields::TOTAL_COST,
    fields::OPERATING_COST,
    fields::TAXES_AND_SURCHARGES,
    fields::SELLING_EXPENSE,
    fields::ADMIN_EXPENSE,
    fields::RD_EXPENSE,
    fields::FINANCIAL_EXPENSE,
    fields::OPERATING_PROFIT,
    fields::TOTAL_PROFIT,
    fields::NET_PROFIT,
    fields::PARENT_NET_PROFIT,
    fields::TOTAL_ASSETS,
    fields::TOTAL_EQUITY,
    fields::SHARE_CAPITAL,
];

const INDEX: [&str; 3] = [fields::NAME, PERIOD_LABEL, fields::REPORT_PERIOD];

const INCOME_COLUMNS: [&str; 5] = [
    fields::REVENUE,
    GROSS_PROFIT,
    fields::OPERATING_PROFIT,
    fields::TOTAL_PROFIT,
    fields::NET_PROFIT,
];

const COST_COLUMNS: [&str; 8] = [
    fields::OPERATING_COST,
    fields::TAXES_AND_SURCHARGES,
    fields::SELLING_EXPENSE,
    fields::ADMIN_EXPENSE,
    fields::RD_EXPENSE,
    fields::FINANCIAL_EXPENSE,
    OTHER_COSTS,
    RESIDUAL_PROFIT,
];

const EFFICIENCY_COLUMNS: [&str; 7] = [
    GROSS_MARGIN,
    OPERATING_MARGIN,
    PRETAX_MARGIN,
    NET_MARGIN,
    SHAREHOLDER_NET_MARGIN,
    ROA,
    ROE,
];

/// Amounts in the income view are shown in units of 10^8.
const HUNDRED_MILLION: f64 = 1e8;

/// `numerator / denominator`, null when the denominator is zero or null.
fn ratio(numerator: Expr, denominator: Expr) -> Expr {
    when(
        denominator
            .clone()
            .is_null()
            .or(denominator.clone().eq(lit(0.0))),
    )
    .then(lit(NULL).cast(DataType::Float64))
    .otherwise(numerator / denominator)
}

/// Computes derived ratios from a statement table.
#[derive(Clone, Debug)]
pub struct RatioEngine {
    frame: DataFrame,
    has_price: bool,
}

impl RatioEngine {
    /// Builds the derived table.
    ///
    /// Amount columns absent from `statements` are added as nulls. A `price`
    /// column, when present, enables `pe` and the screening view.
    ///
    /// # Errors
    /// Returns [`FinstatError::MissingColumns`] if `name` or `report_period`
    /// is absent.
    pub fn new(statements: &DataFrame) -> Result<Self> {
        if statements.width() == 0 {
            return Self::new(&empty_statements()?);
        }
        if !has_columns(statements, &[fields::NAME, fields::REPORT_PERIOD]) {
            return Err(FinstatError::MissingColumns {
                table: "statement".to_string(),
                columns: finstat_core::tabular::missing_columns(
                    statements,
                    [fields::NAME, fields::REPORT_PERIOD],
                ),
            });
        }

        let mut frame = statements.clone();
        let height = frame.height();
        let absent = finstat_core::tabular::missing_columns(&frame, SOURCE_FIELDS);
        if !absent.is_empty() {
            warn!(columns = ?absent, "Statement columns missing, filled with nulls");
        }
        for column in &absent {
            frame.with_column(null_float_column(column, height))?;
        }
        if !has_columns(&frame, &[fields::SUBCLASS_NAME]) {
            frame.with_column(Column::new(
                fields::SUBCLASS_NAME.into(),
                vec![None::<&str>; height],
            ))?;
        }

        let labels: Vec<Option<String>> = string_values(&frame, fields::REPORT_PERIOD)?
            .into_iter()
            .map(|p| p.map(|p| period_label(&p)))
            .collect();
        frame.with_column(Column::new(PERIOD_LABEL.into(), labels))?;

        let has_price = has_columns(&frame, &[fields::PRICE]);
        let price = if has_price {
            col(fields::PRICE).cast(DataType::Float64)
        } else {
            lit(NULL).cast(DataType::Float64)
        };

        let itemized = fields::ITEMIZED_COSTS
            .iter()
            .map(|c| col(*c))
            .reduce(|acc, c| acc + c)
            .unwrap_or_else(|| lit(0.0));

        let casts: Vec<Expr> = SOURCE_FIELDS
            .iter()
            .map(|c| col(*c).cast(DataType::Float64))
            .collect();

        let frame = frame
            .lazy()
            .with_columns(casts)
            .with_columns([
                (col(fields::REVENUE) - col(fields::TOTAL_COST)).alias(GROSS_PROFIT),
                (col(fields::REVENUE) - col(fields::TOTAL_COST)).alias(RESIDUAL_PROFIT),
                (col(fields::TOTAL_COST) - itemized).alias(OTHER_COSTS),
                ratio(col(fields::OPERATING_PROFIT), col(fields::REVENUE)).alias(OPERATING_MARGIN),
                ratio(col(fields::TOTAL_PROFIT), col(fields::REVENUE)).alias(PRETAX_MARGIN),
                ratio(col(fields::NET_PROFIT), col(fields::REVENUE)).alias(NET_MARGIN),
                ratio(col(fields::PARENT_NET_PROFIT), col(fields::REVENUE))
                    .alias(SHAREHOLDER_NET_MARGIN),
                ratio(col(fields::PARENT_NET_PROFIT), col(fields::TOTAL_ASSETS)).alias(ROA),
                ratio(col(fields::PARENT_NET_PROFIT), col(fields::TOTAL_EQUITY)).alias(ROE),
                ratio(col(fields::PARENT_NET_PROFIT), col(fields::SHARE_CAPITAL)).alias(EPS),
            ])
            .with_columns([
                ratio(col(GROSS_PROFIT), col(fields::REVENUE)).alias(GROSS_MARGIN),
                ratio(price, col(EPS)).alias(PE),
            ])
            .collect()?;

        debug!(rows = frame.height(), has_price, "Ratios computed");
        Ok(Self { frame, has_price })
    }

    /// Returns the full derived table with unrounded values.
    #[must_use]
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Returns true if a price column was supplied.
    #[must_use]
    pub const fn has_price(&self) -> bool {
        self.has_price
    }

    /// Revenue and profit amounts in units of 10^8, one decimal.
    ///
    /// # Errors
    /// Returns an error if the view cannot be evaluated.
    pub fn income_view(&self) -> Result<DataFrame> {
        self.view(INCOME_COLUMNS.iter().map(|c| {
            (col(*c) / lit(HUNDRED_MILLION)).round(1).alias(*c)
        }))
    }

    /// Itemized costs, other costs and residual profit as shares of revenue, two decimals.
    ///
    /// # Errors
    /// Returns an error if the view cannot be evaluated.
    pub fn cost_view(&self) -> Result<DataFrame> {
        self.view(
            COST_COLUMNS
                .iter()
                .map(|c| ratio(col(*c), col(fields::REVENUE)).round(2).alias(*c)),
        )
    }

    /// Margins and returns, two decimals.
    ///
    /// # Errors
    /// Returns an error if the view cannot be evaluated.
    pub fn efficiency_view(&self) -> Result<DataFrame> {
        self.view(EFFICIENCY_COLUMNS.iter().map(|c| col(*c).round(2).alias(*c)))
    }

    /// Profitable, fairly valued entities.
    ///
    /// Keeps rows with `0 < roe < 1`, `net_profit > 0`, `0 < pe < 100` and a
    /// defined net margin. Empty when no price was supplied.
    ///
    /// # Errors
    /// Returns an error if the view cannot be evaluated.
    pub fn screening_view(&self) -> Result<DataFrame> {
        let within = col(ROE)
            .gt(lit(0.0))
            .and(col(ROE).lt(lit(1.0)))
            .and(col(fields::NET_PROFIT).gt(lit(0.0)))
            .and(col(PE).gt(lit(0.0)))
            .and(col(PE).lt(lit(100.0)))
            .and(col(NET_MARGIN).is_not_null());
        let keep = if self.has_price { within } else { lit(false) };

        Ok(self
            .frame
            .clone()
            .lazy()
            .filter(keep)
            .select([
                col(fields::NAME),
                col(fields::SUBCLASS_NAME),
                col(fields::NET_PROFIT),
                col(ROE),
                col(PE),
            ])
            .collect()?)
    }

    fn view(&self, values: impl IntoIterator<Item = Expr>) -> Result<DataFrame> {
        let mut exprs: Vec<Expr> = INDEX.iter().map(|c| col(*c)).collect();
        exprs.extend(values);
        Ok(self.frame.clone().lazy().select(exprs).collect()?)
    }
}

fn empty_statements() -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(fields::NAME.into(), Vec::<String>::new()),
        Column::new(fields::REPORT_PERIOD.into(), Vec::<String>::new()),
    ])?)
}
