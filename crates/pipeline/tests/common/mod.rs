use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};
use voldash_core::{DailyBar, TimeSeriesTable};

/// Seeded random walk with calm and turbulent stretches.
pub fn random_walk(n: usize, seed: u64) -> TimeSeriesTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
    let mut close = 100.0_f64;

    let bars = (0..n)
        .map(|i| {
            let step = match (i / 75) % 3 {
                0 => 0.008_f64,
                1 => 0.03,
                _ => 0.015,
            };
            if i > 0 {
                close *= rng.gen_range(-step..step).exp();
            }
            let spread = close * rng.gen_range(0.001..0.02);
            DailyBar {
                date: start + Duration::days(i as i64),
                open: close + rng.gen_range(-spread..spread) / 2.0,
                high: close + spread,
                low: close - spread,
                close,
                volume: rng.gen_range(1.0e6..5.0e6),
            }
        })
        .collect();
    TimeSeriesTable::from_bars(bars)
}

/// Whether two labelings describe the same partition of rows.
pub fn same_partition(a: &[Option<usize>], b: &[Option<usize>]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    (0..a.len()).all(|i| {
        (0..a.len()).all(|j| match (a[i], a[j], b[i], b[j]) {
            (Some(ai), Some(aj), Some(bi), Some(bj)) => (ai == aj) == (bi == bj),
            (ai, aj, bi, bj) => ai.is_some() == bi.is_some() && aj.is_some() == bj.is_some(),
        })
    })
}
