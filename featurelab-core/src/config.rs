//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! [data]
//! sort_order = "descending"
//! output_size = "full"
//!
//! [labels]
//! breakeven = 0.0
//!
//! [indicators]
//! buffer_size = 99
//! exclude = ["mi"]
//!
//! [[scalers]]
//! type = "PASSTHROUGH"
//!
//! [[scalers]]
//! type = "MOVING_STANDARD"
//! window = 20
//!
//! [[distances]]
//! type = "LOWESS"
//! span = 10
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::data::OutputSize;
use crate::domain::SortOrder;
use crate::features::generator::DEFAULT_BUFFER_SIZE;

const DEFAULT_ROLLING_WINDOW: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub sort_order: SortOrder,
    pub output_size: OutputSize,
    /// Use the split/dividend adjusted daily series.
    pub adjusted: bool,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::Descending,
            output_size: OutputSize::Full,
            adjusted: false,
            api_key_env: "AV_API_KEY".into(),
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Minimum next-day return ratio labelled as a rise.
    pub breakeven: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self { breakeven: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub buffer_size: usize,
    /// Catalogue entries to leave out, by name.
    pub exclude: Vec<String>,
    /// Keep only entries whose value depends on a bounded lookback.
    pub finite_memory_only: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            exclude: Vec::new(),
            finite_memory_only: false,
        }
    }
}

fn default_window() -> usize {
    DEFAULT_ROLLING_WINDOW
}

fn default_true() -> bool {
    true
}

fn default_lowess_iterations() -> usize {
    3
}

/// One branch of the scaler union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalerConfig {
    Passthrough,
    Standard,
    MinMax,
    MovingStandard {
        #[serde(default = "default_window")]
        window: usize,
        #[serde(default = "default_true")]
        with_mean: bool,
        #[serde(default = "default_true")]
        with_std: bool,
    },
    MovingMinMax {
        #[serde(default = "default_window")]
        window: usize,
    },
}

impl ScalerConfig {
    fn window(&self) -> Option<usize> {
        match *self {
            ScalerConfig::MovingStandard { window, .. } | ScalerConfig::MovingMinMax { window } => {
                Some(window)
            }
            _ => None,
        }
    }
}

pub fn default_scalers() -> Vec<ScalerConfig> {
    vec![
        ScalerConfig::Passthrough,
        ScalerConfig::Standard,
        ScalerConfig::MinMax,
        ScalerConfig::MovingStandard {
            window: DEFAULT_ROLLING_WINDOW,
            with_mean: true,
            with_std: true,
        },
        ScalerConfig::MovingMinMax {
            window: DEFAULT_ROLLING_WINDOW,
        },
    ]
}

/// One signed-distance branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceConfig {
    Sma {
        #[serde(default = "default_window")]
        window: usize,
    },
    Lowess {
        #[serde(default = "default_window")]
        span: usize,
        #[serde(default = "default_lowess_iterations")]
        iterations: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub data: DataConfig,
    pub labels: LabelConfig,
    pub indicators: IndicatorConfig,
    pub scalers: Vec<ScalerConfig>,
    pub distances: Vec<DistanceConfig>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            labels: LabelConfig::default(),
            indicators: IndicatorConfig::default(),
            scalers: default_scalers(),
            distances: Vec::new(),
        }
    }
}

impl FeatureConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indicators.buffer_size == 0 {
            return Err(ConfigError::Invalid("indicators.buffer_size must be > 0".into()));
        }
        if self.data.max_attempts == 0 {
            return Err(ConfigError::Invalid("data.max_attempts must be > 0".into()));
        }
        if self.scalers.is_empty() {
            return Err(ConfigError::Invalid("at least one scaler branch is required".into()));
        }
        let mut seen = HashSet::new();
        for scaler in &self.scalers {
            if let Some(window) = scaler.window() {
                if window < 2 {
                    return Err(ConfigError::Invalid(format!(
                        "scaler window must be at least 2, got {window}"
                    )));
                }
            }
            if !seen.insert(std::mem::discriminant(scaler)) {
                return Err(ConfigError::Invalid(format!("duplicate scaler branch {scaler:?}")));
            }
        }
        let mut seen = HashSet::new();
        for distance in &self.distances {
            let (key, size) = match *distance {
                DistanceConfig::Sma { window } => (format!("sma{window}"), window),
                DistanceConfig::Lowess { span, iterations } => {
                    if iterations == 0 {
                        return Err(ConfigError::Invalid("lowess iterations must be > 0".into()));
                    }
                    (format!("lowess{span}"), span)
                }
            };
            if size < 2 {
                return Err(ConfigError::Invalid(format!(
                    "distance window must be at least 2, got {size}"
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate distance branch {key}")));
            }
        }
        Ok(())
    }
}
