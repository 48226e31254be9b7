//! Sequential pipeline: features, then regimes, then anomalies.
//!
//! Each stage receives the previous stage's full table and returns a new
//! table with its columns appended. Stages share nothing but the table.

use tracing::info;
use voldash_core::{Config, Result, TimeSeriesTable};
use voldash_features::FeatureEngine;
use voldash_ingestion::validate_table;
use voldash_models::{label_table, AnomalyDetector, RegimeClusterer};

use crate::summary::{RunSummary, StageReport};

/// Annotated table plus a summary of the run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: TimeSeriesTable,
    pub summary: RunSummary,
}

/// The volatility dashboard pipeline.
///
/// Holds configuration only; `run` is reentrant and may be called from
/// several threads at once.
#[derive(Debug, Clone)]
pub struct VolatilityPipeline {
    config: Config,
    features: FeatureEngine,
    clusterer: RegimeClusterer,
    detector: AnomalyDetector,
}

impl VolatilityPipeline {
    /// Build a pipeline, rejecting invalid configuration up front.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: Config) -> Self {
        Self {
            features: FeatureEngine::new(&config.features),
            clusterer: RegimeClusterer::new(&config.clustering),
            detector: AnomalyDetector::new(&config.anomaly),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run all stages on `raw`. The input is never modified.
    pub fn run(&self, raw: &TimeSeriesTable) -> Result<PipelineOutput> {
        validate_table(raw)?;

        let featured = self.features.apply(raw)?;
        info!(rows = featured.len(), columns = ?featured.feature_names(), "features derived");

        let clusters = label_table(&self.clusterer, &featured)?;
        let clustering = StageReport::from_outcome(&clusters);
        let clustered = featured.with_clusters(clusters.labels)?;
        info!(
            k = self.clusterer.n_clusters(),
            eligible_rows = clustering.eligible_rows,
            skipped = clustering.skipped,
            "regimes assigned"
        );

        let anomalies = label_table(&self.detector, &clustered)?;
        let anomaly = StageReport::from_outcome(&anomalies);
        let annotated = clustered.with_anomalies(anomalies.labels)?;

        let summary = RunSummary::build(
            &annotated,
            &self.config.clustering.feature_columns,
            clustering,
            anomaly,
        )?;
        info!(
            eligible_rows = summary.anomaly.eligible_rows,
            anomalies = summary.anomaly_count,
            skipped = summary.anomaly.skipped,
            "anomalies flagged"
        );

        Ok(PipelineOutput {
            table: annotated,
            summary,
        })
    }
}

impl Default for VolatilityPipeline {
    fn default() -> Self {
        Self::from_valid(Config::default())
    }
}
