//! Core domain types.
//!
//! - [`StatementKind`] - The three statement types the provider serves
//! - [`Classification`] - One entity's industry classification
//! - [`WriteOutcome`] - Result of a whole-table replace

use serde::{Deserialize, Serialize};
use std::fmt;

/// Financial statement type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Income statement.
    Income,
    /// Balance sheet.
    Balance,
    /// Cash-flow statement.
    CashFlow,
}

impl StatementKind {
    /// All statement types, in merge order.
    pub const ALL: [Self; 3] = [Self::Income, Self::Balance, Self::CashFlow];

    /// Returns a stable lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Balance => "balance",
            Self::CashFlow => "cash_flow",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Industry classification of a single entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    /// Entity identifier.
    pub code: String,
    /// Entity display name.
    pub name: String,
    /// Industry class code.
    pub class_code: String,
    /// Industry class name.
    pub class_name: String,
    /// Industry subclass code.
    pub subclass_code: String,
    /// Industry subclass name.
    pub subclass_name: String,
}

/// Outcome of a whole-table replace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The table was replaced with this many rows.
    Written {
        /// Number of rows now stored.
        rows: usize,
    },
    /// The input was empty; the store was left untouched.
    NothingToPersist,
}

impl WriteOutcome {
    /// Returns the number of rows written.
    #[must_use]
    pub const fn rows(&self) -> usize {
        match self {
            Self::Written { rows } => *rows,
            Self::NothingToPersist => 0,
        }
    }
}
