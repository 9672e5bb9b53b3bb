//! Optional `pizza-insights.toml` settings, overridden by CLI flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::processor::{
    ProcessorError, aggregator::DEFAULT_PARALLEL_THRESHOLD, sales_processor::LoadOptions,
};
use crate::report::chart::DEFAULT_BUBBLE_SCALE;

pub const DEFAULT_CONFIG_FILE: &str = "pizza-insights.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// chrono formats for `order_date`, tried in order
    pub date_formats: Vec<String>,
    pub parallel_threshold: usize,
    /// Divisor for scaled totals (1000 = thousands)
    pub revenue_divisor: u32,
    pub decimals: u32,
    pub bubble_scale: f64,
    /// Keep going when some rows fail to parse
    pub skip_invalid: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            date_formats: crate::processor::record::DEFAULT_DATE_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            revenue_divisor: 1000,
            decimals: 2,
            bubble_scale: DEFAULT_BUBBLE_SCALE,
            skip_invalid: false,
        }
    }
}

impl Config {
    /// Loads `explicit` if given (it must exist), otherwise
    /// `pizza-insights.toml` in the working directory if present,
    /// otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ProcessorError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path)
            .map_err(|e| ProcessorError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)
            .map_err(|e| ProcessorError::Config(format!("{}: {e}", path.display())))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ProcessorError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ProcessorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.revenue_divisor == 0 {
            return Err(ProcessorError::Config(
                "revenue_divisor must be greater than zero".into(),
            ));
        }
        if !(self.bubble_scale.is_finite() && self.bubble_scale > 0.0) {
            return Err(ProcessorError::Config(
                "bubble_scale must be a positive number".into(),
            ));
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            date_formats: self.date_formats.clone(),
            parallel_threshold: self.parallel_threshold,
        }
    }

    /// Commented TOML with the default values.
    pub fn default_toml() -> String {
        let body = toml::to_string_pretty(&Config::default()).unwrap_or_default();
        format!("# pizza-insights configuration\n\n{body}")
    }
}
