//! Configuration structures for the volatility dashboard pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feature derivation configuration.
    pub features: FeatureConfig,
    /// Volatility regime clustering configuration.
    pub clustering: ClusterConfig,
    /// Anomaly detection configuration.
    pub anomaly: AnomalyConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections and fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check every section for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.clustering.validate()?;
        self.anomaly.validate()
    }
}

/// Feature derivation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Rolling windows (in days) for annualized volatility.
    pub volatility_windows: Vec<usize>,
    /// Rolling windows (in days) for average volume.
    pub volume_windows: Vec<usize>,
    /// Trading days per year used to annualize daily volatility.
    pub annualization_days: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            volatility_windows: vec![20, 60, 120],
            volume_windows: vec![20],
            annualization_days: 252.0,
        }
    }
}

impl FeatureConfig {
    fn validate(&self) -> Result<()> {
        if self.volatility_windows.is_empty() && self.volume_windows.is_empty() {
            return Err(Error::config("at least one rolling window is required"));
        }
        // A sample standard deviation needs two observations.
        if let Some(w) = self.volatility_windows.iter().find(|&&w| w < 2) {
            return Err(Error::config(format!(
                "volatility window must be at least 2, got {w}"
            )));
        }
        if self.volume_windows.contains(&0) {
            return Err(Error::config("volume window must be positive"));
        }
        if !(self.annualization_days.is_finite() && self.annualization_days > 0.0) {
            return Err(Error::config(format!(
                "annualization_days must be positive, got {}",
                self.annualization_days
            )));
        }
        Ok(())
    }
}

/// Volatility regime clustering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Feature columns the regimes are fitted on.
    pub feature_columns: Vec<String>,
    /// Number of regimes (k).
    pub n_clusters: usize,
    /// Number of K-means restarts.
    pub n_init: usize,
    /// Maximum Lloyd iterations per restart.
    pub max_iter: usize,
    /// Random seed for centroid initialization.
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            feature_columns: vec!["vol_20".to_string(), "vol_60".to_string()],
            n_clusters: 3,
            n_init: 10,
            max_iter: 300,
            seed: 42,
        }
    }
}

impl ClusterConfig {
    fn validate(&self) -> Result<()> {
        if self.feature_columns.is_empty() {
            return Err(Error::config("clustering needs at least one feature column"));
        }
        if self.n_clusters == 0 {
            return Err(Error::config("n_clusters must be positive"));
        }
        if self.n_init == 0 {
            return Err(Error::config("n_init must be positive"));
        }
        if self.max_iter == 0 {
            return Err(Error::config("max_iter must be positive"));
        }
        Ok(())
    }
}

/// Anomaly detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Feature columns the isolation forest is fitted on.
    pub feature_columns: Vec<String>,
    /// Expected fraction of anomalous days.
    pub contamination: f64,
    /// Number of isolation trees.
    pub n_estimators: usize,
    /// Subsample size per tree (capped at the number of complete rows).
    pub max_samples: usize,
    /// Minimum complete rows before the detector runs.
    pub min_rows: usize,
    /// Random seed for subsampling and splits.
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            feature_columns: vec!["return".to_string(), "vol_20".to_string()],
            contamination: 0.02,
            n_estimators: 100,
            max_samples: 256,
            min_rows: 20,
            seed: 42,
        }
    }
}

impl AnomalyConfig {
    fn validate(&self) -> Result<()> {
        if self.feature_columns.is_empty() {
            return Err(Error::config("anomaly detection needs at least one feature column"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(Error::config(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(Error::config("n_estimators must be positive"));
        }
        if self.max_samples < 2 {
            return Err(Error::config("max_samples must be at least 2"));
        }
        Ok(())
    }
}
