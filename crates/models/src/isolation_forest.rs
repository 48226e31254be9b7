//! Isolation Forest anomaly detection.
//!
//! Anomalies are few and different, so random axis-aligned splits separate
//! them from the rest in fewer steps. Each tree is grown on a random
//! subsample; a row's score comes from its average path length across the
//! ensemble.

use std::cmp::Reverse;

use ndarray::{Array2, ArrayView1};
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use tracing::debug;
use voldash_core::{config::AnomalyConfig, AnomalyLabel, Error, Result};

use crate::labeler::UnsupervisedLabeler;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful binary search tree lookup over
/// `n` points; normalizes path lengths and accounts for unsplit leaves.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum IsolationNode {
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn build(data: &Array2<f64>, rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::build_node(data, rows, 0, max_depth, rng),
        }
    }

    fn build_node(
        data: &Array2<f64>,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> IsolationNode {
        if depth >= max_depth || rows.len() <= 1 {
            return IsolationNode::Leaf { size: rows.len() };
        }

        // Only features that still vary among these rows can split them
        let ranges: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (lo, hi) = rows.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &r| {
                        let v = data[[r, feature]];
                        (lo.min(v), hi.max(v))
                    },
                );
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();

        if ranges.is_empty() {
            return IsolationNode::Leaf { size: rows.len() };
        }

        let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
        let threshold = rng.gen_range(lo..hi);

        // threshold is in [lo, hi), so both sides are non-empty
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| data[[r, feature]] <= threshold);

        IsolationNode::Internal {
            feature,
            threshold,
            left: Box::new(Self::build_node(data, left, depth + 1, max_depth, rng)),
            right: Box::new(Self::build_node(data, right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationNode::Leaf { size } => {
                    return depth as f64 + average_path_length(*size);
                }
                IsolationNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { &**left } else { &**right };
                    depth += 1;
                }
            }
        }
    }
}

/// Result of fitting and scoring an isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForestFit {
    /// Average path length per input row.
    pub path_lengths: Vec<f64>,
    /// Anomaly score per row in (0, 1]; higher means more anomalous.
    pub scores: Vec<f64>,
    /// Lowest score labeled as an anomaly.
    pub threshold: Option<f64>,
    /// Label per input row.
    pub labels: Vec<AnomalyLabel>,
}

impl IsolationForestFit {
    pub fn anomaly_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_anomaly()).count()
    }
}

/// Isolation Forest over an already prepared matrix.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum number of samples per tree
    pub max_samples: usize,
    /// Expected proportion of anomalies
    pub contamination: f64,
    /// Random seed
    pub seed: u64,
}

impl IsolationForest {
    pub fn new(n_estimators: usize, contamination: f64) -> Self {
        Self {
            n_estimators,
            max_samples: 256,
            contamination,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Number of rows labeled as anomalies out of `n`.
    ///
    /// Matches a cut at the `contamination` percentile (linear interpolation)
    /// of the scores, keeping rows strictly beyond it.
    pub fn anomaly_quota(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let quota = (self.contamination * (n - 1) as f64).ceil() as usize;
        quota.min(n)
    }

    /// Grow the forest on `data` and label every row.
    pub fn fit(&self, data: &Array2<f64>) -> Result<IsolationForestFit> {
        let n = data.nrows();
        if n < 2 || data.ncols() == 0 {
            return Err(Error::model(format!(
                "isolation forest needs at least 2 rows and 1 feature, got {n}x{}",
                data.ncols()
            )));
        }

        let sample_size = self.max_samples.clamp(2, n);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees: Vec<IsolationTree> = (0..self.n_estimators.max(1))
            .map(|_| {
                let rows = index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::build(data, rows, max_depth, &mut rng)
            })
            .collect();

        let normalizer = average_path_length(sample_size);
        let path_lengths: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|row| trees.iter().map(|t| t.path_length(row)).sum::<f64>() / trees.len() as f64)
            .collect();
        let scores: Vec<f64> = path_lengths
            .iter()
            .map(|&h| 2f64.powf(-h / normalizer))
            .collect();

        // Highest scores first; stable sort keeps row order among ties
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| Reverse(OrderedFloat(scores[i])));

        let quota = self.anomaly_quota(n);
        let mut labels = vec![AnomalyLabel::Normal; n];
        for &i in &order[..quota] {
            labels[i] = AnomalyLabel::Anomaly;
        }
        let threshold = quota.checked_sub(1).map(|last| scores[order[last]]);

        debug!(
            rows = n,
            trees = trees.len(),
            sample_size,
            anomalies = quota,
            "isolation forest fitted"
        );

        Ok(IsolationForestFit {
            path_lengths,
            scores,
            threshold,
            labels,
        })
    }
}

/// Flags outlier days with an isolation forest.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    feature_columns: Vec<String>,
    min_rows: usize,
    forest: IsolationForest,
}

impl AnomalyDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            feature_columns: config.feature_columns.clone(),
            min_rows: config.min_rows,
            forest: IsolationForest::new(config.n_estimators, config.contamination)
                .with_max_samples(config.max_samples)
                .with_seed(config.seed),
        }
    }

    pub fn fit(&self, data: &Array2<f64>) -> Result<IsolationForestFit> {
        self.forest.fit(data)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(&AnomalyConfig::default())
    }
}

impl UnsupervisedLabeler for AnomalyDetector {
    type Label = AnomalyLabel;

    fn name(&self) -> &str {
        "anomaly_detector"
    }

    fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    fn min_rows(&self) -> usize {
        // The forest itself cannot split fewer than two rows
        self.min_rows.max(2)
    }

    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<AnomalyLabel>> {
        Ok(self.fit(data)?.labels)
    }
}
