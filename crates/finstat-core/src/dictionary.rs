//! Name dictionaries mapping provider field codes to domain column names.
//!
//! A dictionary is an ordered list of `(code, name)` pairs. The order is part of
//! the contract: normalized tables list their columns in dictionary order.
//!
//! Dictionaries are loaded from TOML:
//!
//! ```toml
//! [[income]]
//! code = "SECCODE"
//! name = "code"
//!
//! [[income]]
//! code = "F035N"
//! name = "revenue"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FinstatError, Result};
use crate::types::StatementKind;

/// One provider code and the domain name it becomes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Provider field code.
    pub code: String,
    /// Domain column name.
    pub name: String,
}

/// Ordered mapping from provider field codes to domain column names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameDictionary {
    entries: Vec<FieldMapping>,
}

impl NameDictionary {
    /// Builds a dictionary from `(code, name)` pairs, keeping their order.
    #[must_use]
    pub fn from_pairs<C, N>(pairs: impl IntoIterator<Item = (C, N)>) -> Self
    where
        C: Into<String>,
        N: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(code, name)| FieldMapping {
                    code: code.into(),
                    name: name.into(),
                })
                .collect(),
        }
    }

    /// Returns the entries in order.
    #[must_use]
    pub fn entries(&self) -> &[FieldMapping] {
        &self.entries
    }

    /// Returns the domain name for a provider code.
    #[must_use]
    pub fn rename(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.name.as_str())
    }

    /// Returns the target column names in dictionary order.
    pub fn target_columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the dictionary has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self, label: &str) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(FinstatError::Config(format!(
                    "{label} dictionary maps two codes to `{}`",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

/// Name dictionaries for the three statement types.
///
/// A statement absent from the TOML parses as an empty dictionary and is then
/// rejected by [`DictionarySet::from_toml_str`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionarySet {
    /// Income statement dictionary.
    pub income: NameDictionary,
    /// Balance sheet dictionary.
    pub balance: NameDictionary,
    /// Cash-flow statement dictionary.
    pub cash_flow: NameDictionary,
}

impl DictionarySet {
    /// Parses a dictionary set from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed, a dictionary is empty, or a
    /// dictionary maps two codes to the same name.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let set: Self = toml::from_str(s).map_err(|e| FinstatError::Parse(e.to_string()))?;
        for kind in StatementKind::ALL {
            let dict = set.get(kind);
            if dict.is_empty() {
                return Err(FinstatError::Config(format!("{kind} dictionary is empty")));
            }
            dict.validate(kind.as_str())?;
        }
        Ok(set)
    }

    /// Loads a dictionary set from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FinstatError::Config(format!("{}: {e}", path.display())))?;
        let set = Self::from_toml_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            income = set.income.len(),
            balance = set.balance.len(),
            cash_flow = set.cash_flow.len(),
            "Loaded name dictionaries"
        );
        Ok(set)
    }

    /// Returns the dictionary for a statement type.
    #[must_use]
    pub const fn get(&self, kind: StatementKind) -> &NameDictionary {
        match kind {
            StatementKind::Income => &self.income,
            StatementKind::Balance => &self.balance,
            StatementKind::CashFlow => &self.cash_flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[income]]
        code = "SECCODE"
        name = "code"

        [[income]]
        code = "F035N"
        name = "revenue"

        [[balance]]
        code = "SECCODE"
        name = "code"

        [[cash_flow]]
        code = "SECCODE"
        name = "code"
    "#;

    #[test]
    fn parses_in_order() {
        let set = DictionarySet::from_toml_str(SAMPLE).unwrap();
        let names: Vec<&str> = set.income.target_columns().collect();
        assert_eq!(names, vec!["code", "revenue"]);
        assert_eq!(set.income.rename("F035N"), Some("revenue"));
        assert_eq!(set.income.rename("F999N"), None);
    }

    #[test]
    fn rejects_empty_dictionary() {
        let err = DictionarySet::from_toml_str("[[income]]\ncode = \"A\"\nname = \"a\"\n")
            .unwrap_err();
        assert!(matches!(err, FinstatError::Config(_)));
        assert!(err.to_string().contains("balance"));

        let err = DictionarySet::from_toml_str("").unwrap_err();
        assert!(matches!(err, FinstatError::Config(_)));
    }

    #[test]
    fn rejects_duplicate_targets() {
        let toml = format!("{SAMPLE}\n[[income]]\ncode = \"F036N\"\nname = \"revenue\"\n");
        let err = DictionarySet::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("revenue"));
    }
}
