//! K-means volatility regime clustering.
//!
//! Lloyd's algorithm with k-means++ seeding and several restarts; the
//! restart with the lowest inertia (within-cluster sum of squared distances)
//! wins. Regime numbering is run-scoped: label 0 in one run has no relation
//! to label 0 in another.

use ndarray::{Array2, ArrayView1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;
use voldash_core::{config::ClusterConfig, Error, RegimeLabel, Result};

use crate::{labeler::UnsupervisedLabeler, scaler::StandardScaler};

#[inline]
fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Result of a K-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster index per input row.
    pub labels: Vec<usize>,
    /// One centroid per row, in the fitted feature space.
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
    /// Lloyd iterations run by the winning restart.
    pub n_iter: usize,
}

/// Plain K-means on an already prepared matrix.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub seed: u64,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_init: 10,
            max_iter: 300,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fit on `data`, keeping the best of `n_init` restarts.
    pub fn fit(&self, data: &Array2<f64>) -> Result<KMeansFit> {
        let n = data.nrows();
        if self.k == 0 || n < self.k {
            return Err(Error::model(format!(
                "k-means needs at least k={} rows, got {n}",
                self.k
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;

        for restart in 0..self.n_init.max(1) {
            let run = self.single_run(data, &mut rng);
            debug!(restart, inertia = run.inertia, n_iter = run.n_iter, "k-means restart");
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        best.ok_or_else(|| Error::model("k-means produced no result"))
    }

    fn single_run(&self, data: &Array2<f64>, rng: &mut StdRng) -> KMeansFit {
        let n = data.nrows();
        let mut centroids = self.init_centroids(data, rng);
        let mut labels = vec![usize::MAX; n];
        let mut n_iter = 0;

        loop {
            let changed = Self::assign(data, &centroids, &mut labels);
            if !changed || n_iter == self.max_iter {
                break;
            }
            n_iter += 1;
            self.update_centroids(data, &mut centroids, &mut labels);
        }

        let inertia = (0..n)
            .map(|i| squared_distance(data.row(i), centroids.row(labels[i])))
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
            n_iter,
        }
    }

    /// k-means++ seeding: each new centroid is drawn with probability
    /// proportional to its squared distance from the nearest chosen one.
    fn init_centroids(&self, data: &Array2<f64>, rng: &mut StdRng) -> Array2<f64> {
        let n = data.nrows();
        let mut centroids = Array2::zeros((self.k, data.ncols()));

        let first = rng.gen_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));
        let mut nearest: Vec<f64> = (0..n)
            .map(|i| squared_distance(data.row(i), data.row(first)))
            .collect();

        for c in 1..self.k {
            let total: f64 = nearest.iter().sum();
            let pick = if total > 0.0 {
                let target = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                let mut chosen = n - 1;
                for (i, &d) in nearest.iter().enumerate() {
                    cumulative += d;
                    if d > 0.0 && cumulative >= target {
                        chosen = i;
                        break;
                    }
                }
                chosen
            } else {
                // All points coincide with chosen centroids
                rng.gen_range(0..n)
            };

            centroids.row_mut(c).assign(&data.row(pick));
            for (i, d) in nearest.iter_mut().enumerate() {
                *d = d.min(squared_distance(data.row(i), data.row(pick)));
            }
        }

        centroids
    }

    /// Assign every row to its nearest centroid (lowest index on ties).
    /// Returns whether any assignment changed.
    fn assign(data: &Array2<f64>, centroids: &Array2<f64>, labels: &mut [usize]) -> bool {
        let mut changed = false;
        for (i, label) in labels.iter_mut().enumerate() {
            let row = data.row(i);
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (c, centroid) in centroids.rows().into_iter().enumerate() {
                let d = squared_distance(row, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            if *label != best {
                *label = best;
                changed = true;
            }
        }
        changed
    }

    /// Move each centroid to the mean of its rows. An empty cluster takes the
    /// row farthest from its own centroid.
    fn update_centroids(&self, data: &Array2<f64>, centroids: &mut Array2<f64>, labels: &mut [usize]) {
        let mut counts = vec![0usize; self.k];
        for &l in labels.iter() {
            counts[l] += 1;
        }

        for c in 0..self.k {
            if counts[c] > 0 {
                continue;
            }
            let far = (0..labels.len())
                .filter(|&i| counts[labels[i]] > 1)
                .map(|i| (i, squared_distance(data.row(i), centroids.row(labels[i]))))
                .fold(None, |acc: Option<(usize, f64)>, (i, d)| match acc {
                    Some((_, best)) if best >= d => acc,
                    _ => Some((i, d)),
                });
            if let Some((i, _)) = far {
                counts[labels[i]] -= 1;
                labels[i] = c;
                counts[c] = 1;
            }
        }

        let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
        for (i, &l) in labels.iter().enumerate() {
            let mut row = sums.row_mut(l);
            row += &data.row(i);
        }
        for c in 0..self.k {
            if counts[c] > 0 {
                let mean = &sums.row(c) / counts[c] as f64;
                centroids.row_mut(c).assign(&mean);
            }
        }
    }
}

/// Partitions days into volatility regimes via standardized K-means.
#[derive(Debug, Clone)]
pub struct RegimeClusterer {
    feature_columns: Vec<String>,
    kmeans: KMeans,
}

impl RegimeClusterer {
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            feature_columns: config.feature_columns.clone(),
            kmeans: KMeans::new(config.n_clusters)
                .with_n_init(config.n_init)
                .with_max_iter(config.max_iter)
                .with_seed(config.seed),
        }
    }

    pub fn n_clusters(&self) -> usize {
        self.kmeans.k
    }

    /// Standardize `data` and fit K-means on it.
    pub fn fit(&self, data: &Array2<f64>) -> Result<KMeansFit> {
        let (_, scaled) = StandardScaler::fit_transform(data);
        self.kmeans.fit(&scaled)
    }
}

impl Default for RegimeClusterer {
    fn default() -> Self {
        Self::new(&ClusterConfig::default())
    }
}

impl UnsupervisedLabeler for RegimeClusterer {
    type Label = RegimeLabel;

    fn name(&self) -> &str {
        "regime_clusterer"
    }

    fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    fn min_rows(&self) -> usize {
        self.kmeans.k
    }

    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<RegimeLabel>> {
        let fit = self.fit(data)?;
        debug!(k = self.kmeans.k, inertia = fit.inertia, "regimes fitted");
        Ok(fit.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::Rng;

    /// Three well separated blobs of 30 points each.
    fn blobs() -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let centers = [(0.0, 0.0), (10.0, 10.0), (-10.0, 10.0)];
        let mut data = Array2::zeros((90, 2));
        for (b, &(cx, cy)) in centers.iter().enumerate() {
            for i in 0..30 {
                data[[b * 30 + i, 0]] = cx + rng.gen_range(-1.0..1.0);
                data[[b * 30 + i, 1]] = cy + rng.gen_range(-1.0..1.0);
            }
        }
        data
    }

    /// Whether two labelings describe the same partition.
    fn same_partition(a: &[usize], b: &[usize]) -> bool {
        a.len() == b.len()
            && (0..a.len()).all(|i| (0..a.len()).all(|j| (a[i] == a[j]) == (b[i] == b[j])))
    }

    #[test]
    fn test_recovers_blobs() {
        let fit = KMeans::new(3).fit(&blobs()).unwrap();
        let expected: Vec<usize> = (0..90).map(|i| i / 30).collect();
        assert!(same_partition(&fit.labels, &expected));
        assert_eq!(fit.centroids.nrows(), 3);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let data = blobs();
        let a = KMeans::new(3).with_seed(11).fit(&data).unwrap();
        let b = KMeans::new(3).with_seed(11).fit(&data).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_partition_stable_across_seeds() {
        let data = blobs();
        let a = KMeans::new(3).with_seed(1).fit(&data).unwrap();
        let b = KMeans::new(3).with_seed(2).fit(&data).unwrap();
        assert!(same_partition(&a.labels, &b.labels));
    }

    #[test]
    fn test_labels_in_range() {
        let fit = KMeans::new(4).fit(&blobs()).unwrap();
        assert!(fit.labels.iter().all(|&l| l < 4));
    }

    #[test]
    fn test_too_few_rows() {
        let data = array![[1.0], [2.0]];
        assert!(KMeans::new(3).fit(&data).is_err());
    }

    #[test]
    fn test_k_equals_n() {
        let data = array![[1.0], [5.0], [9.0]];
        let fit = KMeans::new(3).fit(&data).unwrap();
        assert!(same_partition(&fit.labels, &[0, 1, 2]));
        assert!(fit.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_points_do_not_panic() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let fit = KMeans::new(2).fit(&data).unwrap();
        assert_eq!(fit.labels.len(), 4);
        assert!(fit.labels.iter().all(|&l| l < 2));
    }

    #[test]
    fn test_regime_clusterer_standardizes() {
        // Second feature has a much larger scale; standardization keeps
        // the split driven by both features.
        let mut data = blobs();
        data.column_mut(1).mapv_inplace(|v| v * 1000.0);
        let clusterer = RegimeClusterer::new(&ClusterConfig {
            feature_columns: vec!["a".into(), "b".into()],
            ..ClusterConfig::default()
        });
        let labels = clusterer.fit_predict(&data).unwrap();
        let expected: Vec<usize> = (0..90).map(|i| i / 30).collect();
        assert!(same_partition(&labels, &expected));
    }

    #[test]
    fn test_regime_clusterer_constant_feature() {
        let data = array![[0.2, 1.0], [0.2, 1.1], [0.2, 5.0], [0.2, 5.1]];
        let clusterer = RegimeClusterer::new(&ClusterConfig {
            n_clusters: 2,
            ..ClusterConfig::default()
        });
        let labels = clusterer.fit_predict(&data).unwrap();
        assert!(same_partition(&labels, &[0, 0, 1, 1]));
    }
}
