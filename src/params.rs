//! Parameter metadata for the double bottom pipeline
//!
//! Every tunable (`window`, `order`, `min_separation`, `tolerance`) is described
//! by a [`ParamMeta`], enabling:
//! - Grid search over detector settings
//! - Parameter documentation
//! - Building a config from a loose `name -> value` map
//!
//! # Example
//!
//! ```rust
//! use yadbd::params::{ParamMeta, ParameterizedDetector};
//! use yadbd::prelude::*;
//!
//! for param in DoubleBottomConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{PatternError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fractional value in 0.0..=1.0
  Ratio,
  /// Bar count (positive integer)
  Period,
}

/// Metadata for a single tunable
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name as used in config files and parameter maps
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Search range: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// All values in the search range, `min` to `max` inclusive.
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    if step <= 0.0 {
      return vec![min];
    }
    // Index-based stepping so ratio grids don't accumulate drift
    let steps = ((max - min) / step + 1e-9).floor() as usize;
    (0..=steps).map(|k| min + step * k as f64).collect()
  }

  /// Check a value against the range and type of this parameter.
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for pipeline stages that can be built from a parameter map
pub trait ParameterizedDetector: Sized {
  /// Metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Build from a parameter map. Missing parameters use their defaults.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  fn pattern_id_str() -> &'static str;

  /// Every combination of the parameters' search grids.
  fn param_grid() -> Vec<HashMap<&'static str, f64>> {
    Self::param_meta().iter().fold(vec![HashMap::new()], |combos, meta| {
      let values = meta.generate_grid();
      combos
        .iter()
        .flat_map(|combo| {
          values.iter().map(move |&value| {
            let mut next = combo.clone();
            next.insert(meta.name, value);
            next
          })
        })
        .collect()
    })
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Fetch a Ratio from params, falling back to `default`
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Fetch a Period from params, falling back to `default`
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let Some(&value) = params.get(key) else {
    return Period::new(default);
  };
  if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

// ============================================================
// TESTS
// ============================================================
