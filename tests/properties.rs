//! Property tests: invariants that must hold for any price path.

use proptest::prelude::*;
use yadbd::prelude::*;

#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        1000.0
    }
}

/// Snap to a half-unit grid so equal lows (ties) show up regularly
fn snap(x: f64) -> f64 {
    (x * 2.0).round() / 2.0
}

/// Random walk from 100 with wicks of random length on each side
fn price_path() -> impl Strategy<Value = Vec<TestBar>> {
    prop::collection::vec((-4.0f64..4.0, 0.0f64..3.0, 0.0f64..3.0), 0..160).prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|(delta, up, down)| {
                let o = price;
                let c = snap((price + delta).max(1.0));
                let h = snap(o.max(c) + up);
                let l = snap((o.min(c) - down).max(0.5));
                price = c;
                TestBar { o, h, l, c }
            })
            .collect()
    })
}

fn configs() -> impl Strategy<Value = DoubleBottomConfig> {
    (1usize..30, 1usize..8, 1usize..20, 0.0f64..0.1).prop_map(|(window, order, sep, tol)| {
        DoubleBottomConfig {
            window: Period::new(window).unwrap(),
            order: Period::new(order).unwrap(),
            min_separation: Period::new(sep).unwrap(),
            tolerance: Ratio::new(tol).unwrap(),
        }
    })
}

proptest! {
    #[test]
    fn candidates_are_sound_and_complete(bars in price_path(), order in 1usize..8) {
        let order = Period::new(order).unwrap();
        let candidates = local_minima(&bars, order);
        let k = order.get();

        if bars.len() < 2 * k + 1 {
            prop_assert!(candidates.is_empty());
        } else {
            for i in 0..bars.len() {
                let lo = i.saturating_sub(k);
                let hi = (i + k).min(bars.len() - 1);
                let lowest = (lo..=hi).all(|j| bars[j].l >= bars[i].l);
                prop_assert_eq!(candidates.contains(&i), lowest, "index {}", i);
            }
        }

        prop_assert!(candidates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn confirmed_patterns_hold_invariants(bars in price_path(), config in configs()) {
        let engine = EngineBuilder::new().config(config).build().unwrap();
        let patterns = match engine.scan(&bars) {
            Ok(patterns) => patterns,
            Err(PatternError::EmptySeries) => {
                prop_assert!(bars.is_empty());
                return Ok(());
            }
            Err(other) => return Err(TestCaseError::fail(other.to_string())),
        };

        let trend = engine.compute_trend(&bars);
        let candidates = local_minima(&bars, config.order);

        for p in &patterns {
            let (t1, t2) = (p.first_trough, p.second_trough);

            prop_assert!(t2 - t1 >= config.min_separation.get());
            prop_assert!(trend.is_downtrend(t1));

            let difference = (bars[t1].l - bars[t2].l).abs() / bars[t1].l;
            prop_assert!(difference <= config.tolerance.get());

            // Troughs are adjacent candidates
            let k = candidates.iter().position(|&c| c == t1).unwrap();
            prop_assert_eq!(candidates.get(k + 1), Some(&t2));

            let neckline = bars[t1 + 1..t2].iter().map(|b| b.h).fold(f64::MIN, f64::max);
            prop_assert_eq!(p.neckline, neckline);

            prop_assert!(p.breakout > t2);
            prop_assert!(bars[p.breakout].c > p.neckline);
            prop_assert!(bars[t2 + 1..p.breakout].iter().all(|b| b.c <= p.neckline));
        }

        prop_assert!(patterns.windows(2).all(|w| w[0].first_trough < w[1].first_trough));
    }

    #[test]
    fn scans_are_repeatable(bars in price_path(), config in configs()) {
        let engine = EngineBuilder::new()
            .config(config)
            .validate_data(false)
            .build()
            .unwrap();

        let first = engine.scan(&bars).unwrap();
        let second = engine.scan(&bars).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(engine.iter(&bars).collect::<Vec<_>>(), first);
    }

    #[test]
    fn short_series_report_insufficient(bars in price_path(), config in configs()) {
        let engine = EngineBuilder::new()
            .config(config)
            .validate_data(false)
            .build()
            .unwrap();

        let outcome = engine.scan_report(&bars).unwrap();
        prop_assert_eq!(outcome.is_insufficient(), bars.len() < config.min_bars());
    }
}
