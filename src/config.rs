//! Detector configuration
//!
//! All four tunables are exposed; none are hardcoded in the pipeline. A config
//! can be built in code, from a parameter map, or parsed from TOML:
//!
//! ```toml
//! window = 20
//! order = 5
//! min_separation = 10
//! tolerance = 0.03
//! ```
//!
//! Missing keys take their defaults. Out-of-range values (a zero period, a
//! tolerance outside `[0, 1]`) are rejected while parsing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    detectors::{min_series_len, DoubleBottomMatcher},
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    Period, Ratio, Result,
};

/// Errors raised while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parameters of the double bottom pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubleBottomConfig {
    /// Moving-average length for the trend gate
    pub window: Period,
    /// Half-width of the local minimum neighborhood
    pub order: Period,
    /// Minimum bars between the two troughs
    pub min_separation: Period,
    /// Maximum relative difference between the trough lows
    pub tolerance: Ratio,
}

impl Default for DoubleBottomConfig {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            order: Period::new_const(5),
            min_separation: Period::new_const(10),
            tolerance: Ratio::new_const(0.03),
        }
    }
}

impl DoubleBottomConfig {
    /// Parse from a TOML document.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file.
    pub fn from_toml(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Shortest series for which a scan can produce anything:
    /// `max(window, 2 * order + 1)`.
    pub fn min_bars(&self) -> usize {
        self.window.get().max(min_series_len(self.order))
    }

    pub fn matcher(&self) -> DoubleBottomMatcher {
        DoubleBottomMatcher {
            min_separation: self.min_separation,
            tolerance: self.tolerance,
        }
    }
}

const DOUBLE_BOTTOM_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "window",
        20.0,
        (10.0, 50.0, 10.0),
        "Moving-average length for the downtrend gate",
    ),
    ParamMeta::period(
        "order",
        5.0,
        (3.0, 10.0, 1.0),
        "Half-width of the local minimum neighborhood",
    ),
    ParamMeta::period(
        "min_separation",
        10.0,
        (5.0, 30.0, 5.0),
        "Minimum bars between the two troughs",
    ),
    ParamMeta::ratio(
        "tolerance",
        0.03,
        (0.01, 0.05, 0.01),
        "Maximum relative difference between trough lows",
    ),
];

impl ParameterizedDetector for DoubleBottomConfig {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_BOTTOM_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 20)?,
            order: get_period(params, "order", 5)?,
            min_separation: get_period(params, "min_separation", 10)?,
            tolerance: get_ratio(params, "tolerance", 0.03)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "DOUBLE_BOTTOM"
    }
}
