//! Double bottom matcher
//!
//! Walks the candidate troughs pairwise, `(c[k], c[k + 1])`, and keeps the pairs
//! that are far enough apart, start in a downtrend, sit at comparable prices and
//! have at least one bar between them to form a neckline. Non-adjacent candidate
//! combinations are never tried.

use std::borrow::Cow;
use std::collections::HashMap;
use std::iter::FusedIterator;

use super::helpers::{max_high_between, relative_difference};
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    trend::TrendContext,
    PendingPattern, Period, Ratio, Result, OHLCV,
};

/// Why an adjacent candidate pair was not turned into a pending pattern.
///
/// These are filtering decisions, not failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Troughs closer than `min_separation` bars
    TooClose { separation: usize },
    /// Slope at the first trough undefined or not negative
    NoDowntrend { slope: Option<f64> },
    /// Relative low difference above `tolerance`
    ToleranceExceeded { difference: f64 },
    /// No bar strictly between the troughs
    EmptyInterval,
}

/// Pairs adjacent candidate troughs into pending double bottoms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleBottomMatcher {
    /// Minimum number of bars from the first trough to the second
    pub min_separation: Period,
    /// Maximum relative difference between the two trough lows
    pub tolerance: Ratio,
}

impl Default for DoubleBottomMatcher {
    fn default() -> Self {
        Self {
            min_separation: Period::new_const(10),
            tolerance: Ratio::new_const(0.03),
        }
    }
}

impl DoubleBottomMatcher {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Apply the separation, downtrend, tolerance and neckline checks to one pair.
    pub fn evaluate<T: OHLCV>(
        &self,
        bars: &[T],
        trend: &TrendContext,
        first: usize,
        second: usize,
    ) -> std::result::Result<PendingPattern, Rejection> {
        let separation = second.saturating_sub(first);
        if separation < self.min_separation.get() {
            return Err(Rejection::TooClose { separation });
        }

        let slope = trend.slope(first);
        if !matches!(slope, Some(s) if s < 0.0) {
            return Err(Rejection::NoDowntrend { slope });
        }

        let (Some(first_bar), Some(second_bar)) = (bars.get(first), bars.get(second)) else {
            return Err(Rejection::EmptyInterval);
        };
        let difference = relative_difference(first_bar.low(), second_bar.low());
        if difference > self.tolerance.get() {
            return Err(Rejection::ToleranceExceeded { difference });
        }

        let neckline = max_high_between(bars, first, second).ok_or(Rejection::EmptyInterval)?;

        Ok(PendingPattern {
            first_trough: first,
            second_trough: second,
            neckline,
        })
    }

    /// Lazily match a candidate stream against the bars and trend context.
    pub fn pending<'a, T, I>(
        &self,
        bars: &'a [T],
        trend: &'a TrendContext,
        candidates: I,
    ) -> PendingPatterns<'a, T, I::IntoIter>
    where
        T: OHLCV,
        I: IntoIterator<Item = usize>,
    {
        PendingPatterns::new(*self, bars, Cow::Borrowed(trend), candidates.into_iter())
    }

    /// Like [`pending`](Self::pending), but the iterator takes ownership of the trend context.
    pub fn pending_owned<'a, T, I>(
        &self,
        bars: &'a [T],
        trend: TrendContext,
        candidates: I,
    ) -> PendingPatterns<'a, T, I::IntoIter>
    where
        T: OHLCV,
        I: IntoIterator<Item = usize>,
    {
        PendingPatterns::new(*self, bars, Cow::Owned(trend), candidates.into_iter())
    }
}

/// Iterator over pending patterns produced from adjacent candidate pairs
#[derive(Debug)]
pub struct PendingPatterns<'a, T: OHLCV, I> {
    matcher: DoubleBottomMatcher,
    bars: &'a [T],
    trend: Cow<'a, TrendContext>,
    candidates: I,
    previous: Option<usize>,
}

impl<'a, T: OHLCV, I> PendingPatterns<'a, T, I> {
    fn new(
        matcher: DoubleBottomMatcher,
        bars: &'a [T],
        trend: Cow<'a, TrendContext>,
        candidates: I,
    ) -> Self {
        Self {
            matcher,
            bars,
            trend,
            candidates,
            previous: None,
        }
    }

    pub fn trend(&self) -> &TrendContext {
        &self.trend
    }
}

impl<T: OHLCV, I: Iterator<Item = usize>> Iterator for PendingPatterns<'_, T, I> {
    type Item = PendingPattern;

    fn next(&mut self) -> Option<PendingPattern> {
        for candidate in self.candidates.by_ref() {
            let Some(first) = self.previous.replace(candidate) else {
                continue;
            };
            match self.matcher.evaluate(self.bars, &self.trend, first, candidate) {
                Ok(pending) => return Some(pending),
                Err(rejection) => {
                    tracing::trace!(first, second = candidate, ?rejection, "pair rejected");
                }
            }
        }
        None
    }
}

impl<T: OHLCV, I: FusedIterator<Item = usize>> FusedIterator for PendingPatterns<'_, T, I> {}

// ============================================================
// PARAMETER METADATA
// ============================================================

const DOUBLE_BOTTOM_MATCHER_PARAMS: &[ParamMeta] = &[
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

impl ParameterizedDetector for DoubleBottomMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_BOTTOM_MATCHER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_separation: get_period(params, "min_separation", 10)?,
            tolerance: get_ratio(params, "tolerance", 0.03)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "DOUBLE_BOTTOM"
    }
}
