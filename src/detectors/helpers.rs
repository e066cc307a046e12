//! Price helpers shared by the matcher and the breakout scanner

use crate::OHLCV;

/// Relative difference `|a - b| / |a|`, measured against the first price.
///
/// A zero base is only "equal" to another zero; anything else is infinitely far.
#[inline]
pub fn relative_difference(base: f64, other: f64) -> f64 {
    let diff = (base - other).abs();
    if base == 0.0 {
        return if diff == 0.0 { 0.0 } else { f64::INFINITY };
    }
    diff / base.abs()
}

/// Highest high over bars strictly between `first` and `second`.
///
/// Returns `None` when no bar lies between them.
#[inline]
pub fn max_high_between<T: OHLCV>(bars: &[T], first: usize, second: usize) -> Option<f64> {
    let start = first.checked_add(1)?;
    let end = second.min(bars.len());
    if start >= end {
        return None;
    }
    bars[start..end].iter().map(|b| b.high()).reduce(f64::max)
}

/// First index in `from..` whose close is strictly above `level`.
#[inline]
pub fn first_close_above<T: OHLCV>(bars: &[T], from: usize, level: f64) -> Option<usize> {
    bars.get(from..)?
        .iter()
        .position(|b| b.close() > level)
        .map(|offset| from + offset)
}
