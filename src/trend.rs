//! Trend context: trailing moving average of closes and its slope
//!
//! The trend gate of the double bottom matcher only accepts a first trough that
//! sits in a downtrend, i.e. where the moving average is falling. Both values are
//! undefined near the start of a series and are carried as `None`, never as zero.

use crate::{Period, OHLCV};

/// Moving average and slope at a single bar
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendSample {
    /// Mean close over the trailing window ending at this bar
    pub moving_average: Option<f64>,
    /// `moving_average[i] - moving_average[i - 1]`
    pub slope: Option<f64>,
}

/// Per-bar trend samples for a whole series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendContext {
    window: usize,
    samples: Vec<TrendSample>,
}

impl TrendContext {
    /// Compute the trailing `window`-bar moving average of closes and its first
    /// difference for every bar.
    pub fn compute<T: OHLCV>(bars: &[T], window: Period) -> Self {
        let window = window.get();
        let mut samples = Vec::with_capacity(bars.len());
        let mut prev_ma: Option<f64> = None;

        for i in 0..bars.len() {
            let moving_average = if i + 1 >= window {
                let slice = &bars[i + 1 - window..=i];
                let sum: f64 = slice.iter().map(|b| b.close()).sum();
                Some(sum / window as f64)
            } else {
                None
            };

            let slope = match (moving_average, prev_ma) {
                (Some(ma), Some(prev)) => Some(ma - prev),
                _ => None,
            };

            samples.push(TrendSample {
                moving_average,
                slope,
            });
            prev_ma = moving_average;
        }

        Self { window, samples }
    }

    /// Build a context from precomputed samples (e.g. from an external indicator).
    pub fn from_samples(window: usize, samples: Vec<TrendSample>) -> Self {
        Self { window, samples }
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn sample(&self, index: usize) -> Option<TrendSample> {
        self.samples.get(index).copied()
    }

    #[inline]
    pub fn moving_average(&self, index: usize) -> Option<f64> {
        self.samples.get(index)?.moving_average
    }

    #[inline]
    pub fn slope(&self, index: usize) -> Option<f64> {
        self.samples.get(index)?.slope
    }

    /// True only when the slope is defined and strictly negative.
    #[inline]
    pub fn is_downtrend(&self, index: usize) -> bool {
        matches!(self.slope(index), Some(s) if s < 0.0)
    }

    pub fn samples(&self) -> &[TrendSample] {
        &self.samples
    }
}

/// Source of the trend context fed to the matcher's downtrend gate.
///
/// `window` is the engine's configured averaging length; providers that smooth
/// differently may interpret it as they see fit.
pub trait TrendProvider: Send + Sync {
    fn compute<T: OHLCV>(&self, bars: &[T], window: Period) -> TrendContext;
}

/// Default provider: simple moving average of closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovingAverageTrend;

impl TrendProvider for MovingAverageTrend {
    fn compute<T: OHLCV>(&self, bars: &[T], window: Period) -> TrendContext {
        TrendContext::compute(bars, window)
    }
}
