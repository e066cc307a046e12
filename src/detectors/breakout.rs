//! Breakout confirmation
//!
//! A pending double bottom is confirmed by the first close above its neckline
//! after the second trough. The scan stops at that bar; it does not look for the
//! strongest breakout. A pattern that never breaks out is dropped.

use super::helpers::first_close_above;
use crate::{DoubleBottom, PendingPattern, OHLCV};

/// Forward scanner confirming pending patterns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakoutScanner;

impl BreakoutScanner {
    pub fn new() -> Self {
        Self
    }

    /// Index of the first bar after the second trough closing above the neckline.
    #[inline]
    pub fn find<T: OHLCV>(&self, pending: &PendingPattern, bars: &[T]) -> Option<usize> {
        first_close_above(bars, pending.second_trough + 1, pending.neckline)
    }

    /// Attach the breakout to a pending pattern, or drop it if there is none.
    pub fn confirm<T: OHLCV>(&self, pending: PendingPattern, bars: &[T]) -> Option<DoubleBottom> {
        let breakout = self.find(&pending, bars)?;

        tracing::debug!(
            first = pending.first_trough,
            second = pending.second_trough,
            neckline = pending.neckline,
            breakout,
            "double bottom confirmed"
        );

        Some(DoubleBottom {
            first_trough: pending.first_trough,
            second_trough: pending.second_trough,
            neckline: pending.neckline,
            breakout,
        })
    }
}
