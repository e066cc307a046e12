//! Local minimum detection over the low-price series
//!
//! An index `i` is a candidate trough when no bar within `order` positions on
//! either side (clipped at the series boundaries) has a strictly lower low.
//! Ties do not disqualify a bar, so a flat bottom yields a run of adjacent
//! candidates. The matcher relies on that run being left intact.

use std::iter::FusedIterator;

use crate::{Period, OHLCV};

/// True if `bars[index].low()` is a non-strict local minimum of half-width `order`.
#[inline]
pub fn is_local_min<T: OHLCV>(bars: &[T], index: usize, order: usize) -> bool {
    let Some(bar) = bars.get(index) else {
        return false;
    };
    let low = bar.low();
    let start = index.saturating_sub(order);
    let end = index.saturating_add(order).min(bars.len() - 1);

    bars[start..index].iter().all(|b| b.low() >= low)
        && bars[index + 1..=end].iter().all(|b| b.low() >= low)
}

/// Minimum series length for which any candidate can be reported: `2 * order + 1`.
#[inline]
pub fn min_series_len(order: Period) -> usize {
    order.get().saturating_mul(2).saturating_add(1)
}

/// Lazy iterator over candidate trough indices, in increasing order.
///
/// Cloning yields an independent iterator positioned at the same bar, so the
/// scan can be restarted from any point.
#[derive(Debug)]
pub struct LocalMinima<'a, T: OHLCV> {
    bars: &'a [T],
    order: usize,
    next: usize,
}

impl<'a, T: OHLCV> LocalMinima<'a, T> {
    pub fn new(bars: &'a [T], order: Period) -> Self {
        // Too short for a full neighborhood: nothing to report
        let next = if bars.len() < min_series_len(order) {
            bars.len()
        } else {
            0
        };

        Self {
            bars,
            order: order.get(),
            next,
        }
    }

    /// Rewind to the start of the series.
    pub fn restart(&mut self) {
        *self = Self::new(self.bars, Period::new_const(self.order));
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }
}

impl<T: OHLCV> Clone for LocalMinima<'_, T> {
    fn clone(&self) -> Self {
        Self {
            bars: self.bars,
            order: self.order,
            next: self.next,
        }
    }
}

impl<T: OHLCV> Iterator for LocalMinima<'_, T> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.next < self.bars.len() {
            let index = self.next;
            self.next += 1;
            if is_local_min(self.bars, index, self.order) {
                return Some(index);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.bars.len() - self.next))
    }
}

impl<T: OHLCV> FusedIterator for LocalMinima<'_, T> {}

/// Collect every candidate trough index.
pub fn local_minima<T: OHLCV>(bars: &[T], order: Period) -> Vec<usize> {
    LocalMinima::new(bars, order).collect()
}
