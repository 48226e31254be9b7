//! Unsupervised labelers for the volatility dashboard pipeline.
//!
//! This crate provides:
//! - A shared fit-and-label contract over a numeric feature matrix
//! - Feature standardization
//! - K-means volatility regime clustering
//! - Isolation-forest anomaly detection

pub mod labeler;
pub mod scaler;
pub mod kmeans;
pub mod isolation_forest;

pub use labeler::{label_table, LabelOutcome, UnsupervisedLabeler};
pub use scaler::StandardScaler;
pub use kmeans::{KMeans, KMeansFit, RegimeClusterer};
pub use isolation_forest::{AnomalyDetector, IsolationForest, IsolationForestFit};
