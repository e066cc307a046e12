//! Multi-instrument runner
//!
//! Fetches each symbol's daily series from a [`MarketDataProvider`], scans it,
//! and hands an [`InstrumentReport`] to a [`PatternSink`]. A symbol that fails
//! at any stage is recorded in the [`RunSummary`] and the run moves on.
//!
//! ```rust
//! use yadbd::prelude::*;
//!
//! struct NoData;
//!
//! impl MarketDataProvider for NoData {
//!     type Bar = DailyBar;
//!
//!     fn fetch(&self, symbol: &str) -> std::result::Result<Vec<DailyBar>, ProviderError> {
//!         Err(ProviderError::NoData(symbol.to_string()))
//!     }
//! }
//!
//! let universe = Universe::new(["RELIANCE.NS", "TCS.NS"]);
//! let mut reports: Vec<InstrumentReport> = Vec::new();
//! let summary = universe.run(&NoData, &mut reports, &DoubleBottomEngine::default());
//!
//! assert!(reports.is_empty());
//! assert_eq!(summary.failures.len(), 2);
//! ```

use chrono::{DateTime, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    trend::TrendProvider, DoubleBottom, DoubleBottomEngine, PatternError, ScanOutcome, OHLCV,
};

// ============================================================
// ERRORS
// ============================================================

/// Failure to obtain a symbol's price history
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("no data returned for {0}")]
    NoData(String),

    #[error("fetch failed for {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },
}

/// Failure to publish a report
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to publish {symbol}: {reason}")]
pub struct SinkError {
    pub symbol: String,
    pub reason: String,
}

/// Stage at which a symbol dropped out of a run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstrumentFailure {
    #[error(transparent)]
    Fetch(#[from] ProviderError),

    #[error("scan failed: {0}")]
    Scan(#[from] PatternError),

    #[error(transparent)]
    Publish(#[from] SinkError),
}

// ============================================================
// BOUNDARY TRAITS
// ============================================================

/// Source of daily bars, one symbol at a time.
///
/// Implementations return bars in ascending date order without duplicates.
/// Gaps (holidays, halts) are allowed.
pub trait MarketDataProvider {
    type Bar: OHLCV;

    fn fetch(&self, symbol: &str) -> Result<Vec<Self::Bar>, ProviderError>;
}

/// Consumer of per-instrument reports (chart renderer, file writer, ...)
pub trait PatternSink {
    fn publish(&mut self, report: &InstrumentReport) -> Result<(), SinkError>;
}

/// Collects reports in memory
impl PatternSink for Vec<InstrumentReport> {
    fn publish(&mut self, report: &InstrumentReport) -> Result<(), SinkError> {
        self.push(report.clone());
        Ok(())
    }
}

// ============================================================
// REPORTS
// ============================================================

/// Everything needed to draw one pattern on a price chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub first_trough: usize,
    pub first_date: Option<NaiveDate>,
    pub first_low: f64,
    pub second_trough: usize,
    pub second_date: Option<NaiveDate>,
    pub second_low: f64,
    pub neckline: f64,
    pub breakout: usize,
    pub breakout_date: Option<NaiveDate>,
    pub breakout_close: f64,
}

impl PatternReport {
    /// Resolve a pattern's indices against the bars it was found in.
    ///
    /// Returns `None` if any index is outside `bars`.
    pub fn from_pattern<T: OHLCV>(pattern: &DoubleBottom, bars: &[T]) -> Option<Self> {
        let first = bars.get(pattern.first_trough)?;
        let second = bars.get(pattern.second_trough)?;
        let breakout = bars.get(pattern.breakout)?;

        Some(Self {
            first_trough: pattern.first_trough,
            first_date: bar_date(first),
            first_low: first.low(),
            second_trough: pattern.second_trough,
            second_date: bar_date(second),
            second_low: second.low(),
            neckline: pattern.neckline,
            breakout: pattern.breakout,
            breakout_date: bar_date(breakout),
            breakout_close: breakout.close(),
        })
    }
}

fn bar_date<T: OHLCV>(bar: &T) -> Option<NaiveDate> {
    let ts = bar.timestamp()?;
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

/// Scan result for one symbol, as handed to a [`PatternSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub symbol: String,
    /// Number of bars scanned
    pub bars: usize,
    /// True when the series was too short for the configuration
    pub insufficient_data: bool,
    pub patterns: Vec<PatternReport>,
}

impl InstrumentReport {
    pub fn new<T: OHLCV>(symbol: &str, bars: &[T], outcome: &ScanOutcome) -> Self {
        Self {
            symbol: symbol.to_string(),
            bars: bars.len(),
            insufficient_data: outcome.is_insufficient(),
            patterns: outcome
                .patterns()
                .iter()
                .filter_map(|p| PatternReport::from_pattern(p, bars))
                .collect(),
        }
    }
}

/// Symbol that dropped out of a run
#[derive(Debug, Clone, PartialEq)]
pub struct FailedInstrument {
    pub symbol: String,
    pub error: InstrumentFailure,
}

/// Totals of a universe run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Symbols whose report was published
    pub published: Vec<String>,
    pub failures: Vec<FailedInstrument>,
    /// Confirmed patterns across all published symbols
    pub patterns: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, symbol: &str, result: Result<usize, InstrumentFailure>) {
        match result {
            Ok(found) => {
                tracing::info!(symbol, patterns = found, "published");
                self.published.push(symbol.to_string());
                self.patterns += found;
            }
            Err(error) => {
                tracing::warn!(symbol, %error, "skipping instrument");
                self.failures.push(FailedInstrument {
                    symbol: symbol.to_string(),
                    error,
                });
            }
        }
    }
}

// ============================================================
// UNIVERSE
// ============================================================

/// Ordered list of symbols to scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    symbols: Vec<String>,
}

impl Universe {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Fetch, scan and publish every symbol in order.
    pub fn run<D, S, P>(
        &self,
        provider: &D,
        sink: &mut S,
        engine: &DoubleBottomEngine<P>,
    ) -> RunSummary
    where
        D: MarketDataProvider,
        S: PatternSink,
        P: TrendProvider,
    {
        let mut summary = RunSummary::default();

        for symbol in &self.symbols {
            tracing::info!(symbol = symbol.as_str(), "processing");
            let result = scan_symbol(provider, engine, symbol)
                .and_then(|report| publish(sink, &report));
            summary.record(symbol, result);
        }

        log_summary(&summary);
        summary
    }

    /// Fetch and scan all symbols in parallel, then publish sequentially in
    /// symbol order.
    pub fn run_parallel<D, S, P>(
        &self,
        provider: &D,
        sink: &mut S,
        engine: &DoubleBottomEngine<P>,
    ) -> RunSummary
    where
        D: MarketDataProvider + Sync,
        S: PatternSink,
        P: TrendProvider,
    {
        let scanned: Vec<_> = self
            .symbols
            .par_iter()
            .map(|symbol| {
                tracing::info!(symbol = symbol.as_str(), "processing");
                scan_symbol(provider, engine, symbol)
            })
            .collect();

        let mut summary = RunSummary::default();
        for (symbol, result) in self.symbols.iter().zip(scanned) {
            let result = result.and_then(|report| publish(sink, &report));
            summary.record(symbol, result);
        }

        log_summary(&summary);
        summary
    }
}

fn scan_symbol<D, P>(
    provider: &D,
    engine: &DoubleBottomEngine<P>,
    symbol: &str,
) -> Result<InstrumentReport, InstrumentFailure>
where
    D: MarketDataProvider,
    P: TrendProvider,
{
    let bars = provider.fetch(symbol)?;
    if bars.is_empty() {
        return Err(ProviderError::NoData(symbol.to_string()).into());
    }

    let outcome = engine.scan_report(&bars)?;
    if let ScanOutcome::InsufficientData { need, got } = outcome {
        tracing::debug!(symbol, need, got, "not enough history");
    }
    Ok(InstrumentReport::new(symbol, &bars, &outcome))
}

fn publish<S: PatternSink>(
    sink: &mut S,
    report: &InstrumentReport,
) -> Result<usize, InstrumentFailure> {
    sink.publish(report)?;
    Ok(report.patterns.len())
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        published = summary.published.len(),
        failed = summary.failures.len(),
        patterns = summary.patterns,
        "universe run finished"
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{DailyBar, EngineBuilder};

    fn lerp(a: f64, b: f64, k: usize, n: usize) -> f64 {
        a + (b - a) * k as f64 / n as f64
    }

    fn w_series() -> Vec<DailyBar> {
        let mut ohlc = Vec::new();
        for i in 0..20 {
            let low = lerp(100.0, 80.0, i, 19);
            ohlc.push((low + 0.8, low + 1.0, low, low + 0.5));
        }
        for k in 1..=10 {
            let close = lerp(80.0, 94.0, k, 10);
            let low = if k == 1 { 80.5 } else { close - 1.0 };
            ohlc.push((close - 0.5, close + 1.0, low, close));
        }
        for k in 1..=10 {
            let close = lerp(94.0, 82.0, k, 10);
            ohlc.push((close + 0.5, close + 1.0, close - 1.0, close));
        }
        for c in [88.0, 93.0, 96.0, 97.0, 98.0] {
            ohlc.push((c - 1.0, c + 1.0, c - 1.0, c));
        }
        ohlc.into_iter()
            .enumerate()
            .map(|(i, (o, h, l, c))| DailyBar::synthetic(i, o, h, l, c))
            .collect()
    }

    struct InMemory(HashMap<&'static str, Vec<DailyBar>>);

    impl MarketDataProvider for InMemory {
        type Bar = DailyBar;

        fn fetch(&self, symbol: &str) -> Result<Vec<DailyBar>, ProviderError> {
            self.0
                .get(symbol)
                .cloned()
                .ok_or_else(|| ProviderError::Fetch {
                    symbol: symbol.to_string(),
                    reason: "unknown symbol".to_string(),
                })
        }
    }

    struct RejectAll;

    impl PatternSink for RejectAll {
        fn publish(&mut self, report: &InstrumentReport) -> Result<(), SinkError> {
            Err(SinkError {
                symbol: report.symbol.clone(),
                reason: "disk full".to_string(),
            })
        }
    }

    fn provider() -> InMemory {
        let mut data = HashMap::new();
        data.insert("W", w_series());
        data.insert("EMPTY", Vec::new());
        data.insert("SHORT", w_series()[..8].to_vec());
        let mut broken = w_series();
        broken[7].low = f64::NAN;
        data.insert("BROKEN", broken);
        InMemory(data)
    }

    fn engine() -> crate::DefaultEngine {
        EngineBuilder::new().window(10).build().unwrap()
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_pattern_report_resolves_dates() {
        let bars = w_series();
        let pattern = DoubleBottom {
            first_trough: 19,
            second_trough: 39,
            neckline: 95.0,
            breakout: 42,
        };

        let report = PatternReport::from_pattern(&pattern, &bars).unwrap();
        assert_eq!(report.first_date, Some(bars[19].date));
        assert_eq!(report.second_date, Some(bars[39].date));
        assert_eq!(report.breakout_date, Some(bars[42].date));
        assert_eq!(report.first_low, 80.0);
        assert_eq!(report.second_low, 81.0);
        assert_eq!(report.breakout_close, 96.0);

        let out_of_range = DoubleBottom {
            breakout: 99,
            ..pattern
        };
        assert!(PatternReport::from_pattern(&out_of_range, &bars).is_none());
    }

    #[test]
    fn test_run_publishes_and_isolates_failures() {
        init_tracing();
        let universe = Universe::new(["W", "MISSING", "EMPTY", "BROKEN", "SHORT"]);
        let mut reports: Vec<InstrumentReport> = Vec::new();

        let summary = universe.run(&provider(), &mut reports, &engine());

        assert_eq!(summary.published, vec!["W", "SHORT"]);
        assert_eq!(summary.patterns, 1);
        assert_eq!(summary.failures.len(), 3);
        assert!(!summary.is_clean());

        let failed: Vec<_> = summary.failures.iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(failed, vec!["MISSING", "EMPTY", "BROKEN"]);
        assert!(matches!(
            summary.failures[1].error,
            InstrumentFailure::Fetch(ProviderError::NoData(_))
        ));
        assert!(matches!(
            summary.failures[2].error,
            InstrumentFailure::Scan(PatternError::MalformedBar { index: 7, .. })
        ));

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].patterns.len(), 1);
        assert_eq!(reports[0].patterns[0].breakout, 42);
        assert!(reports[1].insufficient_data);
        assert!(reports[1].patterns.is_empty());
    }

    #[test]
    fn test_publish_failure_is_recorded() {
        let universe = Universe::new(["W"]);
        let summary = universe.run(&provider(), &mut RejectAll, &engine());

        assert!(summary.published.is_empty());
        assert_eq!(summary.patterns, 0);
        assert!(matches!(
            summary.failures[0].error,
            InstrumentFailure::Publish(_)
        ));
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        init_tracing();
        let universe = Universe::new(["SHORT", "W", "MISSING", "BROKEN"]);
        let data = provider();

        let mut sequential: Vec<InstrumentReport> = Vec::new();
        let mut parallel: Vec<InstrumentReport> = Vec::new();
        let a = universe.run(&data, &mut sequential, &engine());
        let b = universe.run_parallel(&data, &mut parallel, &engine());

        assert_eq!(a, b);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[0].symbol, "SHORT");
    }

    #[test]
    fn test_report_serializes() {
        let bars = w_series();
        let outcome = engine().scan_report(&bars).unwrap();
        let report = InstrumentReport::new("W", &bars, &outcome);

        let json = serde_json::to_string(&report).unwrap();
        let back: InstrumentReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
        assert!(json.contains("\"first_date\":\"2024-01-20\""));
    }
}
