//! Reporting period helpers.
//!
//! Statements are keyed by their period-end date. For display the date is
//! shortened to a fiscal label; chronological order is kept by sorting on the
//! date itself, never on the label.

use chrono::{Datelike, NaiveDate};

/// Fiscal position of a reporting period end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FiscalPeriod {
    /// Period ending March 31.
    FirstQuarter,
    /// Period ending June 30.
    HalfYear,
    /// Period ending September 30.
    ThirdQuarter,
    /// Period ending December 31.
    Annual,
}

impl FiscalPeriod {
    /// Classifies a period-end date, if it is one of the four fiscal month ends.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        match (date.month(), date.day()) {
            (3, 31) => Some(Self::FirstQuarter),
            (6, 30) => Some(Self::HalfYear),
            (9, 30) => Some(Self::ThirdQuarter),
            (12, 31) => Some(Self::Annual),
            _ => None,
        }
    }

    const fn suffix(&self) -> &'static str {
        match self {
            Self::FirstQuarter => " Q1",
            Self::HalfYear => " half-year",
            Self::ThirdQuarter => " Q3",
            Self::Annual => "",
        }
    }
}

/// Parses a period string such as `2019-09-30` or `2019-9-30`.
#[must_use]
pub fn parse_period(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // Provider timestamps sometimes carry a time part.
    let date_part = s.split([' ', 'T']).next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Rewrites a period-end date into its short fiscal label.
///
/// `2019-03-31` becomes `2019 Q1`, `2019-06-30` becomes `2019 half-year`,
/// `2019-09-30` becomes `2019 Q3` and `2019-12-31` becomes `2019`. Any other
/// input is returned unchanged.
#[must_use]
pub fn period_label(period: &str) -> String {
    match parse_period(period).and_then(|d| FiscalPeriod::from_date(d).map(|p| (d, p))) {
        Some((date, fiscal)) => format!("{}{}", date.year(), fiscal.suffix()),
        None => period.to_string(),
    }
}
