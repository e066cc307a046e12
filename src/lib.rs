//! # YADBD - Yet Another Double Bottom Detector
//!
//! Detection of the double bottom ("W") reversal pattern in daily price series.
//!
//! A pattern is two comparable troughs, the first one reached in a downtrend,
//! separated by a rally whose highest high forms the neckline. It is confirmed
//! by the first close above that neckline after the second trough.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Days, NaiveDate};
//! use yadbd::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let bars: Vec<DailyBar> = (0..60)
//!     .map(|i| {
//!         let price = 100.0 + i as f64;
//!         DailyBar::new(start + Days::new(i), price, price + 1.0, price - 1.0, price + 0.5, 1_000.0)
//!     })
//!     .collect();
//!
//! // Create engine with the default parameters (window 20, order 5)
//! let engine = EngineBuilder::new().build().unwrap();
//!
//! // A steadily rising series has no double bottom
//! let patterns = engine.scan(&bars).unwrap();
//! assert!(patterns.is_empty());
//! ```

pub mod config;
pub mod detectors;
pub mod params;
pub mod trend;
pub mod universe;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{ConfigError, DoubleBottomConfig},
        // Stages
        detectors::*,
        // Pipeline
        detect_double_bottoms,
        // Parameters
        params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        scan_parallel,
        // Trend
        trend::{MovingAverageTrend, TrendContext, TrendProvider, TrendSample},
        // Universe
        universe::{
            FailedInstrument, InstrumentFailure, InstrumentReport, MarketDataProvider,
            PatternReport, PatternSink, ProviderError, RunSummary, SinkError, Universe,
        },
        // Types
        DailyBar,
        DefaultEngine,
        DoubleBottom,
        // Engine
        DoubleBottomEngine,
        EngineBuilder,
        OHLCVExt,
        // Errors
        PatternError,
        // Iterator
        PatternIterator,
        PendingPattern,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanOutcome,
        ScanResult,
        // Core traits
        OHLCV,
    };
}

use chrono::{NaiveDate, NaiveTime};

use crate::{
    config::DoubleBottomConfig,
    detectors::{BreakoutScanner, LocalMinima, PendingPatterns},
    trend::{MovingAverageTrend, TrendContext, TrendProvider},
};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during pattern detection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Malformed bar at index {index}: {reason}")]
    MalformedBar { index: usize, reason: &'static str },

    #[error("Empty price series")]
    EmptySeries,
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    /// Seconds since the Unix epoch, if the bar is dated
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with consistency checks for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn is_finite(&self) -> bool {
        self.open().is_finite()
            && self.high().is_finite()
            && self.low().is_finite()
            && self.close().is_finite()
    }

    /// Validate OHLC consistency. The reported index is always 0; callers
    /// scanning a series replace it with the bar's position.
    fn validate(&self) -> Result<()> {
        if !self.is_finite() {
            return Err(PatternError::MalformedBar {
                index: 0,
                reason: "non-finite value in OHLC",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::MalformedBar {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// DAILY BAR
// ============================================================

/// One trading day of a single instrument
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl DailyBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar dated `index` days after 2024-01-01, for unit tests
    #[cfg(test)]
    pub(crate) fn synthetic(index: usize, open: f64, high: f64, low: f64, close: f64) -> Self {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.checked_add_days(chrono::Days::new(index as u64)))
            .unwrap();
        Self::new(date, open, high, low, close, 1000.0)
    }
}

impl OHLCV for DailyBar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.date.and_time(NaiveTime::MIN).and_utc().timestamp())
    }
}

// ============================================================
// PATTERNS
// ============================================================

/// Trough pair that passed the matcher but has not broken out yet
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PendingPattern {
    pub first_trough: usize,
    pub second_trough: usize,
    /// Highest high strictly between the troughs
    pub neckline: f64,
}

/// Confirmed double bottom. All fields are indices into the scanned series
/// except `neckline`, which is a price.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DoubleBottom {
    pub first_trough: usize,
    pub second_trough: usize,
    pub neckline: f64,
    /// First bar after `second_trough` closing above `neckline`
    pub breakout: usize,
}

/// Outcome of a single-instrument scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// The series was long enough to scan. May hold zero patterns.
    Scanned(Vec<DoubleBottom>),
    /// The series is shorter than the configuration can make use of
    InsufficientData { need: usize, got: usize },
}

impl ScanOutcome {
    pub fn patterns(&self) -> &[DoubleBottom] {
        match self {
            Self::Scanned(patterns) => patterns,
            Self::InsufficientData { .. } => &[],
        }
    }

    pub fn into_patterns(self) -> Vec<DoubleBottom> {
        match self {
            Self::Scanned(patterns) => patterns,
            Self::InsufficientData { .. } => Vec::new(),
        }
    }

    #[inline]
    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// Treat a too-short series as an error.
    pub fn require_sufficient(self) -> Result<Vec<DoubleBottom>> {
        match self {
            Self::Scanned(patterns) => Ok(patterns),
            Self::InsufficientData { need, got } => {
                Err(PatternError::InsufficientData { need, got })
            }
        }
    }
}

// ============================================================
// DOUBLE BOTTOM ENGINE
// ============================================================

/// Main detection engine: trend gate, candidate troughs, pair matching and
/// breakout confirmation over one price series at a time.
#[derive(Debug, Clone)]
pub struct DoubleBottomEngine<P: TrendProvider = MovingAverageTrend> {
    trend_provider: P,
    config: DoubleBottomConfig,
    breakout: BreakoutScanner,
    validate_data: bool,
}

impl DoubleBottomEngine<MovingAverageTrend> {
    /// Engine with the moving-average trend gate and data validation enabled
    pub fn new(config: DoubleBottomConfig) -> Self {
        Self {
            trend_provider: MovingAverageTrend,
            config,
            breakout: BreakoutScanner::new(),
            validate_data: true,
        }
    }
}

impl Default for DoubleBottomEngine<MovingAverageTrend> {
    fn default() -> Self {
        Self::new(DoubleBottomConfig::default())
    }
}

impl<P: TrendProvider> DoubleBottomEngine<P> {
    #[inline]
    pub fn config(&self) -> &DoubleBottomConfig {
        &self.config
    }

    #[inline]
    pub fn validates_data(&self) -> bool {
        self.validate_data
    }

    // ===========================================
    // LOW-LEVEL: Stages
    // ===========================================

    /// Moving average and slope for every bar.
    #[inline]
    pub fn compute_trend<T: OHLCV>(&self, bars: &[T]) -> TrendContext {
        self.trend_provider.compute(bars, self.config.window)
    }

    /// Candidate trough indices, lazily, in increasing order.
    #[inline]
    pub fn candidates<'a, T: OHLCV>(&self, bars: &'a [T]) -> LocalMinima<'a, T> {
        LocalMinima::new(bars, self.config.order)
    }

    /// Trough pairs that pass the matcher, before breakout confirmation.
    pub fn pending<'a, T: OHLCV>(&self, bars: &'a [T]) -> PendingPatterns<'a, T, LocalMinima<'a, T>> {
        let trend = self.compute_trend(bars);
        self.config
            .matcher()
            .pending_owned(bars, trend, self.candidates(bars))
    }

    /// Confirm a single pending pattern against the bars.
    #[inline]
    pub fn confirm<T: OHLCV>(&self, pending: PendingPattern, bars: &[T]) -> Option<DoubleBottom> {
        self.breakout.confirm(pending, bars)
    }

    // ===========================================
    // HIGH-LEVEL: Whole series
    // ===========================================

    /// Scan a series and return every confirmed pattern in order of the first
    /// trough. A series too short for the configuration yields no patterns.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<DoubleBottom>> {
        self.scan_report(bars).map(ScanOutcome::into_patterns)
    }

    /// Like [`scan`](Self::scan), but reports a too-short series explicitly.
    pub fn scan_report<T: OHLCV>(&self, bars: &[T]) -> Result<ScanOutcome> {
        if self.validate_data {
            validate_bars(bars)?;
        }

        let need = self.config.min_bars();
        if bars.len() < need {
            tracing::debug!(need, got = bars.len(), "series too short, skipping scan");
            return Ok(ScanOutcome::InsufficientData {
                need,
                got: bars.len(),
            });
        }

        Ok(ScanOutcome::Scanned(self.iter(bars).collect()))
    }

    /// Lazy iterator over confirmed patterns. Performs no validation.
    pub fn iter<'a, T: OHLCV>(&self, bars: &'a [T]) -> PatternIterator<'a, T> {
        PatternIterator {
            pending: self.pending(bars),
            bars,
            breakout: self.breakout,
        }
    }
}

fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    if bars.is_empty() {
        return Err(PatternError::EmptySeries);
    }

    let mut previous: Option<i64> = None;
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            PatternError::MalformedBar { reason, .. } => {
                PatternError::MalformedBar { index: i, reason }
            }
            other => other,
        })?;

        if let Some(ts) = bar.timestamp() {
            if previous.is_some_and(|prev| ts <= prev) {
                return Err(PatternError::MalformedBar {
                    index: i,
                    reason: "timestamp not strictly increasing",
                });
            }
            previous = Some(ts);
        }
    }
    Ok(())
}

// ============================================================
// PATTERN ITERATOR
// ============================================================

/// Iterator over confirmed double bottoms of one series
#[derive(Debug)]
pub struct PatternIterator<'a, T: OHLCV> {
    pending: PendingPatterns<'a, T, LocalMinima<'a, T>>,
    bars: &'a [T],
    breakout: BreakoutScanner,
}

impl<T: OHLCV> PatternIterator<'_, T> {
    /// Trend context the iterator was built with
    pub fn trend(&self) -> &TrendContext {
        self.pending.trend()
    }
}

impl<T: OHLCV> Iterator for PatternIterator<'_, T> {
    type Item = DoubleBottom;

    fn next(&mut self) -> Option<Self::Item> {
        for pending in self.pending.by_ref() {
            if let Some(pattern) = self.breakout.confirm(pending, self.bars) {
                return Some(pattern);
            }
            tracing::trace!(
                first = pending.first_trough,
                second = pending.second_trough,
                "no breakout before series end"
            );
        }
        None
    }
}

impl<T: OHLCV> std::iter::FusedIterator for PatternIterator<'_, T> {}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating DoubleBottomEngine instances
#[derive(Debug, Clone)]
pub struct EngineBuilder<P: TrendProvider = MovingAverageTrend> {
    trend_provider: P,
    window: usize,
    order: usize,
    min_separation: usize,
    tolerance: f64,
    validate_data: bool,
}

impl Default for EngineBuilder<MovingAverageTrend> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<MovingAverageTrend> {
    pub fn new() -> Self {
        let defaults = DoubleBottomConfig::default();
        Self {
            trend_provider: MovingAverageTrend,
            window: defaults.window.get(),
            order: defaults.order.get(),
            min_separation: defaults.min_separation.get(),
            tolerance: defaults.tolerance.get(),
            validate_data: true,
        }
    }
}

impl<P: TrendProvider> EngineBuilder<P> {
    /// Change trend provider
    pub fn trend_provider<P2: TrendProvider>(self, provider: P2) -> EngineBuilder<P2> {
        EngineBuilder {
            trend_provider: provider,
            window: self.window,
            order: self.order,
            min_separation: self.min_separation,
            tolerance: self.tolerance,
            validate_data: self.validate_data,
        }
    }

    /// Take all four parameters from an existing config
    pub fn config(mut self, config: DoubleBottomConfig) -> Self {
        self.window = config.window.get();
        self.order = config.order.get();
        self.min_separation = config.min_separation.get();
        self.tolerance = config.tolerance.get();
        self
    }

    /// Moving-average length of the trend gate
    pub fn window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Half-width of the local minimum neighborhood
    pub fn order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn min_separation(mut self, bars: usize) -> Self {
        self.min_separation = bars;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<DoubleBottomEngine<P>> {
        let config = DoubleBottomConfig {
            window: checked_period("window", self.window)?,
            order: checked_period("order", self.order)?,
            min_separation: checked_period("min_separation", self.min_separation)?,
            tolerance: Ratio::new(self.tolerance)
                .map_err(|e| PatternError::InvalidConfig(format!("tolerance: {e}")))?,
        };

        Ok(DoubleBottomEngine {
            trend_provider: self.trend_provider,
            config,
            breakout: BreakoutScanner::new(),
            validate_data: self.validate_data,
        })
    }
}

fn checked_period(field: &str, value: usize) -> Result<Period> {
    Period::new(value).map_err(|e| PatternError::InvalidConfig(format!("{field}: {e}")))
}

// ============================================================
// PIPELINE
// ============================================================

/// Detect confirmed double bottoms in one validated series.
///
/// Equivalent to scanning with a default-built engine carrying `config`.
pub fn detect_double_bottoms<T: OHLCV>(
    bars: &[T],
    config: &DoubleBottomConfig,
) -> Result<Vec<DoubleBottom>> {
    DoubleBottomEngine::new(*config).scan(bars)
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub outcome: ScanOutcome,
}

impl ScanResult {
    pub fn patterns(&self) -> &[DoubleBottom] {
        self.outcome.patterns()
    }
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel scanning of multiple instruments
pub fn scan_parallel<'a, T, I, P>(
    engine: &DoubleBottomEngine<P>,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    P: TrendProvider,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .scan_report(bars)
                .map(|outcome| ScanResult {
                    symbol: symbol.to_string(),
                    outcome,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TYPE ALIASES
// ============================================================

/// Default engine with the moving-average trend gate
pub type DefaultEngine = DoubleBottomEngine<MovingAverageTrend>;

// ============================================================
// TESTS
// ============================================================
