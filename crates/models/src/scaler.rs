//! Feature standardization to zero mean and unit variance.

use ndarray::{Array1, Array2, Axis};
use statrs::statistics::Statistics;
use tracing::warn;

/// Per-column standardizer using the population standard deviation.
///
/// A column with (numerically) zero variance is neutralized: every
/// standardized value in it is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    means: Array1<f64>,
    /// `None` for a constant column.
    scales: Vec<Option<f64>>,
}

impl StandardScaler {
    /// Learn column means and standard deviations.
    pub fn fit(data: &Array2<f64>) -> Self {
        let mut means = Array1::zeros(data.ncols());
        let mut scales = Vec::with_capacity(data.ncols());

        for (j, column) in data.axis_iter(Axis(1)).enumerate() {
            let mean = column.iter().mean();
            let std = column.iter().population_std_dev();
            means[j] = mean;

            let tolerance = 10.0 * f64::EPSILON * mean.abs().max(1.0);
            if std.is_finite() && std > tolerance {
                scales.push(Some(std));
            } else {
                warn!(column = j, "zero-variance feature neutralized");
                scales.push(None);
            }
        }

        Self { means, scales }
    }

    /// Standard deviation per column; `None` for neutralized columns.
    pub fn scales(&self) -> &[Option<f64>] {
        &self.scales
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut out = data.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            match self.scales[j] {
                Some(scale) => {
                    let mean = self.means[j];
                    column.mapv_inplace(|v| (v - mean) / scale);
                }
                None => column.fill(0.0),
            }
        }
        out
    }

    pub fn fit_transform(data: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(data);
        let scaled = scaler.transform(data);
        (scaler, scaled)
    }
}
