//! Logging for graft.
//!
//! The crate only emits `tracing` events:
//!
//! - `debug` for every fetch batch, every id a fetcher did not return and
//!   every finished load
//! - `warn` when a load stops at `max_rounds` with references unresolved
//! - `trace` for every reference the walker queues or skips, under the
//!   [`WALK_TARGET`] target so it can be filtered on its own
//!
//! Applications with a subscriber of their own need nothing from this
//! module. [`init`] installs one (feature `tracing-subscriber`) driven by:
//!
//! - `GRAFT_DEBUG=true|1|yes` - log at `debug`
//! - `GRAFT_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `GRAFT_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! Nothing is installed unless one of the first two is set.
//!
//! ```rust,no_run
//! graft_loader::logging::init();
//! ```

use std::sync::Once;
use tracing::Level;

use crate::config::{EnvSource, StdEnvSource};

/// Environment variable enabling debug logging.
pub const ENV_DEBUG: &str = "GRAFT_DEBUG";
/// Environment variable selecting the level.
pub const ENV_LOG_LEVEL: &str = "GRAFT_LOG_LEVEL";
/// Environment variable selecting the output format.
pub const ENV_LOG_FORMAT: &str = "GRAFT_LOG_FORMAT";

/// Target of the per-reference walk events.
pub const WALK_TARGET: &str = "graft_loader::walk";

static INIT: Once = Once::new();

/// Subscriber output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human readable.
    Pretty,
    /// Single-line, human readable.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Logging settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Whether a subscriber should be installed at all.
    pub enabled: bool,
    /// Maximum level for graft's targets.
    pub level: Level,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Read settings from an environment source.
    ///
    /// An unknown `GRAFT_LOG_LEVEL` falls back to the `GRAFT_DEBUG` default.
    pub fn from_env_source(source: &impl EnvSource) -> Self {
        let debug = source
            .get_non_empty(ENV_DEBUG)
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));
        let explicit = source.get_non_empty(ENV_LOG_LEVEL);

        let fallback = if debug { Level::DEBUG } else { Level::WARN };
        let level = explicit
            .as_deref()
            .and_then(|v| v.parse::<Level>().ok())
            .unwrap_or(fallback);
        let format = source
            .get_non_empty(ENV_LOG_FORMAT)
            .map(|v| LogFormat::parse(&v))
            .unwrap_or_default();

        Self {
            enabled: debug || explicit.is_some(),
            level,
            format,
        }
    }

    /// `EnvFilter` directive covering both graft crates.
    pub fn filter_directive(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        format!("graft={},graft_loader={}", level, level)
    }
}

/// Install a subscriber configured from the process environment.
///
/// Subsequent calls are no-ops.
pub fn init() {
    init_with(&StdEnvSource);
}

/// Install a subscriber configured from `source`.
///
/// Only the first call in a process has an effect. A subscriber installed
/// by the host application is kept.
pub fn init_with(source: &impl EnvSource) {
    INIT.call_once(|| {
        let settings = LogSettings::from_env_source(source);
        if !settings.enabled {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(settings.filter_directive())
                .unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);
            let installed = match settings.format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(
                    level = %settings.level,
                    format = ?settings.format,
                    "graft logging initialized"
                );
            }
        }
    });
}

/// Trace event under [`WALK_TARGET`].
#[macro_export]
macro_rules! graft_trace {
    ($($arg:tt)*) => {
        ::tracing::trace!(target: $crate::logging::WALK_TARGET, $($arg)*)
    };
}
