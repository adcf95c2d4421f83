//! Configuration loaded from TOML with environment overrides.
//!
//! ```toml
//! [provider]
//! client_id = "..."
//! timeout_secs = 30
//!
//! [pipeline]
//! batch_limit = 50
//! report_period = "2018-12-31"
//!
//! [database]
//! path = "financial_statements.sqlite3"
//! ```
//!
//! Every field has a default. `FINSTAT_CLIENT_ID` and `FINSTAT_CLIENT_SECRET`
//! override the provider credentials.

use std::path::{Path, PathBuf};

use finstat_cninfo::{CnInfoConfig, CnInfoLayout};
use finstat_core::{FinstatError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::PipelineOptions;
use crate::price::PriceOptions;

/// Environment variable holding the provider client id.
pub const CLIENT_ID_VAR: &str = "FINSTAT_CLIENT_ID";
/// Environment variable holding the provider client secret.
pub const CLIENT_SECRET_VAR: &str = "FINSTAT_CLIENT_SECRET";

/// Database settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("financial_statements.sqlite3"),
        }
    }
}

/// Name dictionary settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// TOML file with the `[[income]]`, `[[balance]]` and `[[cash_flow]]` entries.
    pub path: PathBuf,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/name_dictionary.toml"),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinstatConfig {
    /// Provider connection.
    pub provider: CnInfoConfig,
    /// Provider endpoints.
    pub layout: CnInfoLayout,
    /// Download run options.
    pub pipeline: PipelineOptions,
    /// Price lookup options.
    pub price: PriceOptions,
    /// Database location.
    pub database: DatabaseConfig,
    /// Name dictionary location.
    pub dictionary: DictionaryConfig,
}

impl FinstatConfig {
    /// Parses a configuration from TOML. Environment overrides are not applied.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or a value is invalid.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| FinstatError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file and applies environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FinstatError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overrides the provider credentials from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(CLIENT_ID_VAR).filter(|v| !v.is_empty()) {
            self.provider.client_id = id;
        }
        if let Some(secret) = lookup(CLIENT_SECRET_VAR).filter(|v| !v.is_empty()) {
            self.provider.client_secret = secret;
        }
    }

    /// Checks values that have no usable meaning.
    ///
    /// # Errors
    /// Returns [`FinstatError::Config`] for a zero batch limit or concurrency.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_limit == 0 || self.price.batch_limit == 0 {
            return Err(FinstatError::Config("batch_limit must be positive".to_string()));
        }
        if self.pipeline.concurrency == 0 {
            return Err(FinstatError::Config("concurrency must be positive".to_string()));
        }
        Ok(())
    }

    /// Checks that provider credentials are present.
    ///
    /// # Errors
    /// Returns [`FinstatError::Config`] naming the variables to set.
    pub fn require_credentials(&self) -> Result<()> {
        if self.provider.client_id.is_empty() || self.provider.client_secret.is_empty() {
            return Err(FinstatError::Config(format!(
                "provider credentials missing; set {CLIENT_ID_VAR} and {CLIENT_SECRET_VAR}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Alignment;

    #[test]
    fn defaults() {
        let config = FinstatConfig::default();
        assert_eq!(config.pipeline.batch_limit, 50);
        assert_eq!(config.pipeline.report_period, "2018-12-31");
        assert_eq!(config.pipeline.statement_table, "statement");
        assert_eq!(config.pipeline.alignment, Alignment::Complete);
        assert_eq!(config.layout.plate_type, "137002");
        assert!(config.require_credentials().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = FinstatConfig::from_toml_str(
            r#"
            [provider]
            client_id = "id"
            client_secret = "secret"
            max_retries = 5

            [pipeline]
            concurrency = 8
            alignment = "outer"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.max_retries, 5);
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.pipeline.concurrency, 8);
        assert_eq!(config.pipeline.alignment, Alignment::Outer);
        assert_eq!(config.pipeline.batch_limit, 50);
        config.require_credentials().unwrap();
        assert!(!format!("{config:?}").contains("\"secret\""));
    }

    #[test]
    fn rejects_zero_limits() {
        let err = FinstatConfig::from_toml_str("[pipeline]\nbatch_limit = 0").unwrap_err();
        assert!(matches!(err, FinstatError::Config(_)));
        let err = FinstatConfig::from_toml_str("[pipeline]\nbatch_limit = \"many\"").unwrap_err();
        assert!(matches!(err, FinstatError::Parse(_)));
    }

    #[test]
    fn sample_files_parse() {
        let config =
            FinstatConfig::from_toml_str(include_str!("../../../config/finstat.sample.toml"))
                .unwrap();
        assert_eq!(config.price.max_rollback_days, 10);

        let dictionaries = finstat_core::DictionarySet::from_toml_str(include_str!(
            "../../../config/name_dictionary.toml"
        ))
        .unwrap();
        assert_eq!(dictionaries.income.rename("F035N"), Some("revenue"));
    }

    #[test]
    fn default_dictionary_path_is_shipped() {
        let sample =
            FinstatConfig::from_toml_str(include_str!("../../../config/finstat.sample.toml"))
                .unwrap();
        let default = DictionaryConfig::default();
        assert_eq!(sample.dictionary, default);

        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        assert!(root.join(&default.path).is_file());
    }

    #[test]
    fn environment_overrides_credentials() {
        let mut config = FinstatConfig::default();
        config.apply_overrides(|key| match key {
            CLIENT_ID_VAR => Some("env-id".to_string()),
            CLIENT_SECRET_VAR => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.provider.client_id, "env-id");
        assert_eq!(config.provider.client_secret, "");
    }
}
