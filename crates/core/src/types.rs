//! Core data types for the volatility dashboard pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Trading date (one row per date).
pub type TradingDate = NaiveDate;

/// Regime label assigned by the clusterer (0..k-1, run-scoped).
pub type RegimeLabel = usize;

/// Base OHLCV column names, as delivered by the retrieval collaborator.
pub const BASE_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Name of the log return column.
pub const RETURN_COLUMN: &str = "return";

/// Name of the annualized volatility column for a window.
pub fn volatility_column(window: usize) -> String {
    format!("vol_{window}")
}

/// Name of the rolling average volume column for a window.
pub fn volume_average_column(window: usize) -> String {
    format!("vol_avg_{window}")
}

/// A single daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date.
    pub date: TradingDate,
    /// Open price.
    #[serde(alias = "Open")]
    pub open: f64,
    /// High price.
    #[serde(alias = "High")]
    pub high: f64,
    /// Low price.
    #[serde(alias = "Low")]
    pub low: f64,
    /// Close price.
    #[serde(alias = "Close")]
    pub close: f64,
    /// Traded volume.
    #[serde(alias = "Volume")]
    pub volume: f64,
}

impl DailyBar {
    /// Look up a base column value by name.
    pub fn base_value(&self, column: &str) -> Option<f64> {
        match column {
            "Open" => Some(self.open),
            "High" => Some(self.high),
            "Low" => Some(self.low),
            "Close" => Some(self.close),
            "Volume" => Some(self.volume),
            _ => None,
        }
    }
}

/// Outcome of the anomaly detector for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyLabel {
    /// Ordinary trading day.
    Normal,
    /// Day easily isolated from the rest.
    Anomaly,
}

impl AnomalyLabel {
    /// Signed code used by plotting code: -1 for anomalies, 1 for normal days.
    pub fn code(self) -> i8 {
        match self {
            AnomalyLabel::Normal => 1,
            AnomalyLabel::Anomaly => -1,
        }
    }

    pub fn is_anomaly(self) -> bool {
        self == AnomalyLabel::Anomaly
    }
}

impl fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyLabel::Normal => write!(f, "Normal"),
            AnomalyLabel::Anomaly => write!(f, "Anomaly"),
        }
    }
}

/// A derived numeric column; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl FeatureColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Number of present (non-missing) values.
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Rows where every requested column is present, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteRows {
    /// Column names, in request order.
    pub columns: Vec<String>,
    /// Table row index of each complete row.
    pub indices: Vec<usize>,
    /// Row-major values, one inner vector per complete row.
    pub values: Vec<Vec<f64>>,
}

impl CompleteRows {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Spread per-complete-row labels back over all `n_rows` table rows.
    pub fn scatter<L: Copy>(&self, labels: &[L], n_rows: usize) -> Result<Vec<Option<L>>> {
        if labels.len() != self.indices.len() {
            return Err(Error::data(format!(
                "expected {} labels, got {}",
                self.indices.len(),
                labels.len()
            )));
        }
        let mut out = vec![None; n_rows];
        for (&row, &label) in self.indices.iter().zip(labels) {
            if row >= n_rows {
                return Err(Error::data(format!("row index {row} out of range")));
            }
            out[row] = Some(label);
        }
        Ok(out)
    }
}

/// Ordered daily table: base OHLCV bars plus columns appended by pipeline stages.
///
/// Stages never reorder, insert, or drop rows. Every derived column has
/// exactly one value slot per bar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeriesTable {
    bars: Vec<DailyBar>,
    features: Vec<FeatureColumn>,
    clusters: Option<Vec<Option<RegimeLabel>>>,
    anomalies: Option<Vec<Option<AnomalyLabel>>>,
}

impl TimeSeriesTable {
    /// Create a table from raw bars. Contract checks live in the ingestion validator.
    pub fn from_bars(bars: Vec<DailyBar>) -> Self {
        Self {
            bars,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn dates(&self) -> impl Iterator<Item = TradingDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Derived feature columns, in the order they were appended.
    pub fn features(&self) -> &[FeatureColumn] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&[Option<f64>]> {
        self.features
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|c| c.name.as_str()).collect()
    }

    /// Values of a base or derived column.
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        if BASE_COLUMNS.contains(&name) {
            return Ok(self.bars.iter().map(|b| b.base_value(name)).collect());
        }
        self.feature(name)
            .map(|values| values.to_vec())
            .ok_or_else(|| Error::missing_column(name))
    }

    /// Regime labels, if the clustering stage has run.
    pub fn clusters(&self) -> Option<&[Option<RegimeLabel>]> {
        self.clusters.as_deref()
    }

    /// Anomaly labels, if the anomaly stage has run.
    pub fn anomalies(&self) -> Option<&[Option<AnomalyLabel>]> {
        self.anomalies.as_deref()
    }

    fn check_len(&self, what: &str, len: usize) -> Result<()> {
        if len != self.bars.len() {
            return Err(Error::data(format!(
                "{what} has {len} values but the table has {} rows",
                self.bars.len()
            )));
        }
        Ok(())
    }

    /// Append a derived column. A column with the same name is recomputed in place.
    pub fn with_feature(mut self, column: FeatureColumn) -> Result<Self> {
        self.check_len(&column.name, column.values.len())?;
        if BASE_COLUMNS.contains(&column.name.as_str()) {
            return Err(Error::data(format!(
                "derived column '{}' would shadow a base column",
                column.name
            )));
        }
        match self.features.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.features.push(column),
        }
        Ok(self)
    }

    /// Attach the regime label column.
    pub fn with_clusters(mut self, labels: Vec<Option<RegimeLabel>>) -> Result<Self> {
        self.check_len("cluster", labels.len())?;
        self.clusters = Some(labels);
        Ok(self)
    }

    /// Attach the anomaly label column.
    pub fn with_anomalies(mut self, labels: Vec<Option<AnomalyLabel>>) -> Result<Self> {
        self.check_len("anomaly", labels.len())?;
        self.anomalies = Some(labels);
        Ok(self)
    }

    /// Select rows where every one of `columns` is present.
    pub fn complete_rows(&self, columns: &[String]) -> Result<CompleteRows> {
        let data = columns
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;

        let mut indices = Vec::new();
        let mut values = Vec::new();
        for row in 0..self.bars.len() {
            let picked: Option<Vec<f64>> = data.iter().map(|col| col[row]).collect();
            if let Some(v) = picked {
                indices.push(row);
                values.push(v);
            }
        }

        Ok(CompleteRows {
            columns: columns.to_vec(),
            indices,
            values,
        })
    }

    /// Flatten into one record per row for renderers and serializers.
    pub fn rows(&self) -> Vec<AnnotatedRow> {
        self.bars
            .iter()
            .enumerate()
            .map(|(i, bar)| AnnotatedRow {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                features: self
                    .features
                    .iter()
                    .map(|c| (c.name.clone(), c.values[i]))
                    .collect(),
                cluster: self.clusters.as_ref().and_then(|c| c[i]),
                anomaly: self.anomalies.as_ref().and_then(|a| a[i]),
            })
            .collect()
    }
}

/// One output row: base values, derived features, and labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedRow {
    pub date: TradingDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(flatten)]
    pub features: BTreeMap<String, Option<f64>>,
    pub cluster: Option<RegimeLabel>,
    pub anomaly: Option<AnomalyLabel>,
}
