//! Feature computation engine.
//!
//! Combines all feature components into a single table transformation.

use tracing::debug;
use voldash_core::{
    config::FeatureConfig, volatility_column, volume_average_column, FeatureColumn, Result,
    TimeSeriesTable, RETURN_COLUMN,
};

use crate::{
    volatility::{log_returns, RollingVolatility},
    volume::RollingMean,
};

/// Feature computation engine.
///
/// A pure function of the base OHLCV columns: running it on its own output
/// recomputes identical columns.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    volatility_windows: Vec<usize>,
    volume_windows: Vec<usize>,
    annualization_days: f64,
}

impl FeatureEngine {
    /// Create a new feature engine from configuration.
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            volatility_windows: config.volatility_windows.clone(),
            volume_windows: config.volume_windows.clone(),
            annualization_days: config.annualization_days,
        }
    }

    /// Derive `return`, `vol_W` and `vol_avg_W` columns.
    pub fn apply(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
        let returns = log_returns(&table.closes());
        let mut out = table
            .clone()
            .with_feature(FeatureColumn::new(RETURN_COLUMN, returns.clone()))?;

        for &window in &self.volatility_windows {
            let column = self.rolling_volatility(&returns, window);
            debug!(window, present = column.present_count(), "rolling volatility");
            out = out.with_feature(column)?;
        }

        let volumes: Vec<Option<f64>> = table.volumes().into_iter().map(Some).collect();
        for &window in &self.volume_windows {
            let column = Self::rolling_volume(&volumes, window);
            debug!(window, present = column.present_count(), "rolling volume");
            out = out.with_feature(column)?;
        }

        Ok(out)
    }

    fn rolling_volatility(&self, returns: &[Option<f64>], window: usize) -> FeatureColumn {
        let mut vol = RollingVolatility::annualized(window, self.annualization_days);
        let values = returns.iter().map(|&r| vol.push(r)).collect();
        FeatureColumn::new(volatility_column(window), values)
    }

    fn rolling_volume(volumes: &[Option<f64>], window: usize) -> FeatureColumn {
        let mut mean = RollingMean::new(window);
        let values = volumes.iter().map(|&v| mean.push(v)).collect();
        FeatureColumn::new(volume_average_column(window), values)
    }
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new(&FeatureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use statrs::statistics::Statistics;
    use voldash_core::DailyBar;

    fn make_table(n: usize) -> TimeSeriesTable {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let bars = (0..n)
            .map(|i| {
                // Deterministic wiggle so every window has non-zero spread
                let close = 100.0 * (1.0 + 0.01 * ((i * 7 % 11) as f64 - 5.0) / 5.0)
                    + i as f64 * 0.1;
                DailyBar {
                    date: start + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0 + (i % 13) as f64 * 50.0,
                }
            })
            .collect();
        TimeSeriesTable::from_bars(bars)
    }

    #[test]
    fn test_output_columns() {
        let out = FeatureEngine::default().apply(&make_table(10)).unwrap();
        assert_eq!(
            out.feature_names(),
            vec!["return", "vol_20", "vol_60", "vol_120", "vol_avg_20"]
        );
    }

    #[test]
    fn test_missing_prefix_per_window() {
        let table = make_table(150);
        let out = FeatureEngine::default().apply(&table).unwrap();
        assert_eq!(out.len(), 150);

        assert!(out.feature("return").unwrap()[0].is_none());
        assert!(out.feature("return").unwrap()[1..].iter().all(Option::is_some));

        for w in [20usize, 60, 120] {
            let col = out.feature(&format!("vol_{w}")).unwrap();
            assert!(col[..w].iter().all(Option::is_none), "vol_{w} prefix");
            assert!(col[w..].iter().all(Option::is_some), "vol_{w} tail");
        }

        // Volume has no missing first slot
        let avg = out.feature("vol_avg_20").unwrap();
        assert!(avg[..19].iter().all(Option::is_none));
        assert!(avg[19..].iter().all(Option::is_some));
    }

    #[test]
    fn test_volatility_matches_direct_computation() {
        let table = make_table(80);
        let out = FeatureEngine::default().apply(&table).unwrap();
        let returns: Vec<f64> = out.feature("return").unwrap()[1..]
            .iter()
            .map(|r| r.unwrap())
            .collect();

        // Row 45 covers returns at rows 26..=45
        let window = &returns[25..45];
        let expected = window.std_dev() * 252f64.sqrt();
        assert_relative_eq!(
            out.feature("vol_20").unwrap()[45].unwrap(),
            expected,
            epsilon = 1e-10
        );

        let volumes = table.volumes();
        let expected_avg = volumes[26..46].mean();
        assert_relative_eq!(
            out.feature("vol_avg_20").unwrap()[45].unwrap(),
            expected_avg,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_idempotent() {
        let engine = FeatureEngine::default();
        let once = engine.apply(&make_table(130)).unwrap();
        let twice = engine.apply(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_does_not_mutate_input() {
        let table = make_table(30);
        let before = table.clone();
        let _ = FeatureEngine::default().apply(&table).unwrap();
        assert_eq!(table, before);
        assert!(table.features().is_empty());
    }

    #[test]
    fn test_short_table_all_missing() {
        let out = FeatureEngine::default().apply(&make_table(10)).unwrap();
        assert_eq!(out.len(), 10);
        assert!(out.feature("vol_20").unwrap().iter().all(Option::is_none));
        assert!(out.feature("vol_avg_20").unwrap().iter().all(Option::is_none));
    }

    #[test]
    fn test_custom_windows() {
        let config = FeatureConfig {
            volatility_windows: vec![5],
            volume_windows: vec![3, 10],
            annualization_days: 252.0,
        };
        let out = FeatureEngine::new(&config).apply(&make_table(20)).unwrap();
        assert_eq!(
            out.feature_names(),
            vec!["return", "vol_5", "vol_avg_3", "vol_avg_10"]
        );
        assert!(out.feature("vol_5").unwrap()[5].is_some());
        assert!(out.feature("vol_5").unwrap()[4].is_none());
    }
}
