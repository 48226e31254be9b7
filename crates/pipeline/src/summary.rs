//! Run summary consumed by the renderer.

use std::collections::BTreeMap;

use serde::Serialize;
use voldash_core::{RegimeLabel, Result, TimeSeriesTable, TradingDate};
use voldash_models::LabelOutcome;

/// What a labeling stage did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Complete rows over the stage's feature columns.
    pub eligible_rows: usize,
    /// Rows that received a label.
    pub labeled_rows: usize,
    /// True when too few complete rows were available.
    pub skipped: bool,
}

impl StageReport {
    pub fn from_outcome<L>(outcome: &LabelOutcome<L>) -> Self {
        Self {
            eligible_rows: outcome.eligible_rows,
            labeled_rows: outcome.labeled_rows(),
            skipped: !outcome.fitted,
        }
    }
}

/// Per-regime statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeStats {
    pub label: RegimeLabel,
    pub rows: usize,
    /// Mean of each clustering feature over the regime's rows.
    pub feature_means: BTreeMap<String, f64>,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    pub clustering: StageReport,
    pub anomaly: StageReport,
    /// Regimes ordered by label.
    pub regimes: Vec<RegimeStats>,
    pub anomaly_count: usize,
    pub anomaly_dates: Vec<TradingDate>,
}

impl RunSummary {
    pub fn build(
        table: &TimeSeriesTable,
        cluster_features: &[String],
        clustering: StageReport,
        anomaly: StageReport,
    ) -> Result<Self> {
        let regimes = Self::regime_stats(table, cluster_features)?;

        let anomaly_dates: Vec<TradingDate> = match table.anomalies() {
            Some(labels) => table
                .dates()
                .zip(labels)
                .filter(|(_, l)| l.map_or(false, |l| l.is_anomaly()))
                .map(|(d, _)| d)
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            rows: table.len(),
            clustering,
            anomaly,
            regimes,
            anomaly_count: anomaly_dates.len(),
            anomaly_dates,
        })
    }

    fn regime_stats(table: &TimeSeriesTable, features: &[String]) -> Result<Vec<RegimeStats>> {
        let Some(labels) = table.clusters() else {
            return Ok(Vec::new());
        };
        let columns = features
            .iter()
            .map(|name| Ok((name.clone(), table.column(name)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut members: BTreeMap<RegimeLabel, Vec<usize>> = BTreeMap::new();
        for (row, label) in labels.iter().enumerate() {
            if let Some(label) = label {
                members.entry(*label).or_default().push(row);
            }
        }

        Ok(members
            .into_iter()
            .map(|(label, rows)| {
                let feature_means = columns
                    .iter()
                    .map(|(name, values)| {
                        let sum: f64 = rows.iter().filter_map(|&r| values[r]).sum();
                        (name.clone(), sum / rows.len() as f64)
                    })
                    .collect();
                RegimeStats {
                    label,
                    rows: rows.len(),
                    feature_means,
                }
            })
            .collect())
    }
}
