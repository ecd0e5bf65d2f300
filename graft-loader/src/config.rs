//! Loader configuration.
//!
//! Configuration can come from a TOML file, a TOML string or the process
//! environment:
//!
//! ```toml
//! [loader]
//! batch_size = 100
//! max_rounds = 8
//! locale = "en"
//! concurrent_fetches = true
//! ```
//!
//! # Environment Variables
//!
//! - `GRAFT_BATCH_SIZE` - maximum ids per fetch call
//! - `GRAFT_MAX_ROUNDS` - upper bound on walk/fetch/splice rounds per load
//! - `GRAFT_LOCALE` - locale forwarded to the fetcher
//! - `GRAFT_CONCURRENT_FETCHES` - `true`/`1`/`yes` to run a round's batches concurrently

mod env;

pub use env::{EnvSource, MapEnvSource, StdEnvSource};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LoadError, LoadResult};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "graft.toml";

/// Default upper bound on load rounds.
pub const DEFAULT_MAX_ROUNDS: usize = 16;

/// Environment variable for [`LoaderConfig::batch_size`].
pub const ENV_BATCH_SIZE: &str = "GRAFT_BATCH_SIZE";
/// Environment variable for [`LoaderConfig::max_rounds`].
pub const ENV_MAX_ROUNDS: &str = "GRAFT_MAX_ROUNDS";
/// Environment variable for [`LoaderConfig::locale`].
pub const ENV_LOCALE: &str = "GRAFT_LOCALE";
/// Environment variable for [`LoaderConfig::concurrent_fetches`].
pub const ENV_CONCURRENT_FETCHES: &str = "GRAFT_CONCURRENT_FETCHES";

/// Loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum ids per fetch call. `None` sends each bucket in one call.
    pub batch_size: Option<usize>,

    /// Upper bound on walk/fetch/splice rounds per load.
    pub max_rounds: usize,

    /// Locale forwarded to the fetcher with every request.
    pub locale: Option<String>,

    /// Issue all batches of a round concurrently.
    pub concurrent_fetches: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            locale: None,
            concurrent_fetches: false,
        }
    }
}

impl LoaderConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the round limit.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Enable or disable concurrent fetches.
    pub fn with_concurrent_fetches(mut self, enabled: bool) -> Self {
        self.concurrent_fetches = enabled;
        self
    }

    /// Parse configuration from TOML.
    ///
    /// Settings may live in a `[loader]` table or at the top level.
    pub fn from_toml_str(content: &str) -> LoadResult<Self> {
        let mut table: toml::Table = toml::from_str(content)?;

        let config: LoaderConfig = match table.remove("loader") {
            Some(loader @ toml::Value::Table(_)) => loader.try_into()?,
            Some(_) => {
                return Err(LoadError::configuration("`loader` must be a table")
                    .with_field("loader"));
            }
            None => toml::Value::Table(table).try_into()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoadError::configuration(format!("cannot read {}: {}", path.display(), e))
                .with_source(e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Render the configuration as a `[loader]` TOML table.
    pub fn to_toml_string(&self) -> LoadResult<String> {
        #[derive(Serialize)]
        struct Wrapper<'a> {
            loader: &'a LoaderConfig,
        }

        toml::to_string_pretty(&Wrapper { loader: self })
            .map_err(|e| LoadError::serialization(e.to_string()).with_source(e))
    }

    /// Build configuration from the process environment.
    pub fn from_env() -> LoadResult<Self> {
        Self::from_env_source(&StdEnvSource)
    }

    /// Build configuration from an environment source.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env_source(source: &impl EnvSource) -> LoadResult<Self> {
        let mut config = Self::default();

        if let Some(value) = source.get_non_empty(ENV_BATCH_SIZE) {
            config.batch_size = Some(parse_count(ENV_BATCH_SIZE, &value)?);
        }
        if let Some(value) = source.get_non_empty(ENV_MAX_ROUNDS) {
            config.max_rounds = parse_count(ENV_MAX_ROUNDS, &value)?;
        }
        if let Some(value) = source.get_non_empty(ENV_LOCALE) {
            config.locale = Some(value);
        }
        if let Some(value) = source.get_non_empty(ENV_CONCURRENT_FETCHES) {
            config.concurrent_fetches = parse_flag(ENV_CONCURRENT_FETCHES, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make loading impossible.
    pub fn validate(&self) -> LoadResult<()> {
        if self.batch_size == Some(0) {
            return Err(LoadError::configuration("batch_size must be at least 1")
                .with_field("batch_size")
                .with_suggestion("Leave batch_size unset to fetch each bucket in one call"));
        }
        if self.max_rounds == 0 {
            return Err(LoadError::configuration("max_rounds must be at least 1")
                .with_field("max_rounds"));
        }
        Ok(())
    }
}

fn parse_count(name: &str, value: &str) -> LoadResult<usize> {
    value.parse::<usize>().map_err(|e| {
        LoadError::configuration(format!("{} must be a non-negative integer, got '{}'", name, value))
            .with_field(name)
            .with_source(e)
    })
}

fn parse_flag(name: &str, value: &str) -> LoadResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(
            LoadError::configuration(format!("{} must be a boolean, got '{}'", name, value))
                .with_field(name),
        ),
    }
}
