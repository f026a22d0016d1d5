use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::valuation::tools::error::{Result, ToolError};

/// Directive used when neither `RUST_LOG` nor a configuration file sets one.
pub const DEFAULT_FILTER: &str = "info";

/// Logging settings read from a JSON file, e.g.
/// `{"filter": "info,valuation_tools=debug", "ansi": false, "file": "fetch.log"}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    pub filter: Option<String>,
    /// Colourise terminal output. Ignored when logging to a file.
    pub ansi: Option<bool>,
    /// Append events to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&source)?)
    }

    pub fn filter_directive(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_FILTER)
    }
}

/// Installs the global tracing subscriber.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directive()))
        .map_err(|err| ToolError::Logging(err.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder
            .with_ansi(config.ansi.unwrap_or(true))
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|err| ToolError::Logging(err.to_string()))
}
