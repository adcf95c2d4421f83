//! Aligning the three statements of a batch and stacking batch results.

use std::collections::HashSet;

use finstat_core::{
    FinstatError, Result, fields,
    tabular::{missing_columns, string_values},
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How the three statement sources of a batch are aligned on the key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Keep only keys present in all three sources.
    #[default]
    Complete,
    /// Keep every key seen in any source; a key absent from one source gets
    /// nulls in that source's columns.
    Outer,
}

impl Alignment {
    fn join_type(self) -> JoinType {
        match self {
            Self::Complete => JoinType::Inner,
            Self::Outer => JoinType::Full,
        }
    }
}

/// Keeps the first row of every key, in input order.
fn first_per_key(df: &DataFrame) -> Result<DataFrame> {
    let codes = string_values(df, fields::CODE)?;
    let names = string_values(df, fields::NAME)?;
    let periods = string_values(df, fields::REPORT_PERIOD)?;

    let mut seen = HashSet::new();
    let mask: Vec<bool> = codes
        .into_iter()
        .zip(names)
        .zip(periods)
        .map(|((code, name), period)| seen.insert((code, name, period)))
        .collect();
    if mask.iter().all(|keep| *keep) {
        return Ok(df.clone());
    }

    let out = df.filter(&BooleanChunked::from_slice("keep".into(), &mask))?;
    warn!(dropped = df.height() - out.height(), "Dropped rows with a repeated key");
    Ok(out)
}

/// Merges the normalized income, balance and cash-flow tables of one batch.
///
/// Provenance columns are dropped. A column present in several sources keeps
/// its first occurrence in income, balance, cash-flow order. A key repeated
/// within a source keeps its first row. The key columns lead the output and
/// rows with a null key component are excluded.
///
/// A source without any column (an empty or failed provider answer) leaves
/// the batch without data: the result is an empty frame in every alignment.
///
/// # Errors
/// Returns [`FinstatError::MergeFailure`] if a non-empty source lacks a key column.
pub fn merge_statements(
    income: &DataFrame,
    balance: &DataFrame,
    cash_flow: &DataFrame,
    alignment: Alignment,
) -> Result<DataFrame> {
    let sources = [("income", income), ("balance", balance), ("cash_flow", cash_flow)];

    if let Some((label, _)) = sources.iter().find(|(_, df)| df.width() == 0) {
        debug!(source = *label, "Source returned no data, batch is empty");
        return Ok(DataFrame::empty());
    }

    for (label, df) in &sources {
        let absent = missing_columns(df, fields::KEY);
        if !absent.is_empty() {
            return Err(FinstatError::MergeFailure(format!(
                "{label} lacks key columns {absent:?}"
            )));
        }
    }

    let mut taken: Vec<String> = Vec::new();
    let mut frames: Vec<LazyFrame> = Vec::new();
    for (_, df) in sources {
        let mut keep: Vec<String> = fields::KEY.iter().map(|k| k.to_string()).collect();
        for name in df.get_column_names() {
            let name = name.as_str();
            if fields::KEY.contains(&name)
                || fields::PROVENANCE.contains(&name)
                || taken.iter().any(|t| t == name)
            {
                continue;
            }
            taken.push(name.to_string());
            keep.push(name.to_string());
        }
        frames.push(first_per_key(&df.select(keep)?)?.lazy());
    }

    let mut frames = frames.into_iter();
    let Some(mut merged) = frames.next() else {
        return Ok(DataFrame::empty());
    };

    let key: Vec<Expr> = fields::KEY.iter().map(|k| col(*k)).collect();
    for frame in frames {
        merged = merged.join(
            frame,
            key.clone(),
            key.clone(),
            JoinArgs::new(alignment.join_type()).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }

    let complete_key = col(fields::CODE)
        .is_not_null()
        .and(col(fields::NAME).is_not_null())
        .and(col(fields::REPORT_PERIOD).is_not_null());

    let out = merged
        .filter(complete_key)
        .sort_by_exprs(
            vec![col(fields::CODE), col(fields::REPORT_PERIOD)],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    // Joins may move the key; put it back in front.
    let mut order: Vec<String> = fields::KEY.iter().map(|k| k.to_string()).collect();
    order.extend(
        out.get_column_names()
            .iter()
            .map(|c| c.to_string())
            .filter(|c| !fields::KEY.contains(&c.as_str())),
    );
    let out = out.select(order)?;

    debug!(rows = out.height(), columns = out.width(), ?alignment, "Merged batch");
    Ok(out)
}

/// Stacks per-batch results, filling columns a batch lacks with nulls.
///
/// # Errors
/// Returns an error if the frames cannot be concatenated.
pub fn concat_batches(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let frames: Vec<LazyFrame> = frames
        .into_iter()
        .filter(|df| df.height() > 0)
        .map(IntoLazy::lazy)
        .collect();
    if frames.is_empty() {
        return Ok(DataFrame::empty());
    }
    Ok(concat_lf_diagonal(frames, UnionArgs::default())?.collect()?)
}
