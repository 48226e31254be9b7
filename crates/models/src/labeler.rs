//! Fit-and-label contract shared by the clustering and anomaly stages.
//!
//! A labeler sees only the matrix of complete rows. Row selection, the
//! insufficient-data skip and spreading labels back over the full table
//! happen once, in [`label_table`].

use ndarray::Array2;
use tracing::{debug, warn};
use voldash_core::{Error, Result, TimeSeriesTable};

/// An unsupervised model that assigns one label per input row.
pub trait UnsupervisedLabeler {
    /// Label type produced per row.
    type Label: Copy;

    /// Stage name used in logs and reports.
    fn name(&self) -> &str;

    /// Table columns forming the feature matrix, in column order.
    fn feature_columns(&self) -> &[String];

    /// Fewer complete rows than this skips the stage.
    fn min_rows(&self) -> usize;

    /// Fit on `data` (one row per observation) and label every row.
    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<Self::Label>>;
}

/// Labels for every table row plus what happened while producing them.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelOutcome<L> {
    /// One slot per table row; `None` for incomplete rows or a skipped stage.
    pub labels: Vec<Option<L>>,
    /// Number of complete rows over the feature columns.
    pub eligible_rows: usize,
    /// Whether the model was fitted (false when the stage was skipped).
    pub fitted: bool,
}

impl<L> LabelOutcome<L> {
    /// Number of rows that received a label.
    pub fn labeled_rows(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }
}

/// Fit `model` on the complete rows of `table` and label them.
///
/// A table with fewer complete rows than [`UnsupervisedLabeler::min_rows`]
/// is not an error: every label is `None`.
pub fn label_table<M>(model: &M, table: &TimeSeriesTable) -> Result<LabelOutcome<M::Label>>
where
    M: UnsupervisedLabeler,
{
    let complete = table.complete_rows(model.feature_columns())?;
    let eligible_rows = complete.len();

    if eligible_rows < model.min_rows() {
        warn!(
            stage = model.name(),
            eligible_rows,
            required = model.min_rows(),
            "not enough complete rows, skipping stage"
        );
        return Ok(LabelOutcome {
            labels: vec![None; table.len()],
            eligible_rows,
            fitted: false,
        });
    }

    let n_features = complete.columns.len();
    let flat: Vec<f64> = complete.values.iter().flatten().copied().collect();
    let data = Array2::from_shape_vec((eligible_rows, n_features), flat)
        .map_err(|e| Error::model(format!("{}: bad feature matrix: {e}", model.name())))?;

    debug!(stage = model.name(), rows = eligible_rows, features = n_features, "fitting");
    let labels = model.fit_predict(&data)?;
    let labels = complete.scatter(&labels, table.len())?;

    Ok(LabelOutcome {
        labels,
        eligible_rows,
        fitted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use voldash_core::{DailyBar, FeatureColumn};

    /// Labels each row with its position among complete rows.
    struct RowCounter {
        columns: Vec<String>,
        min_rows: usize,
    }

    impl UnsupervisedLabeler for RowCounter {
        type Label = usize;

        fn name(&self) -> &str {
            "row_counter"
        }

        fn feature_columns(&self) -> &[String] {
            &self.columns
        }

        fn min_rows(&self) -> usize {
            self.min_rows
        }

        fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<usize>> {
            Ok((0..data.nrows()).collect())
        }
    }

    fn table() -> TimeSeriesTable {
        let bars = (1..=4)
            .map(|d| DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .collect();
        TimeSeriesTable::from_bars(bars)
            .with_feature(FeatureColumn::new(
                "x",
                vec![None, Some(1.0), None, Some(2.0)],
            ))
            .unwrap()
    }

    #[test]
    fn test_labels_only_complete_rows() {
        let model = RowCounter {
            columns: vec!["x".into(), "Close".into()],
            min_rows: 1,
        };
        let outcome = label_table(&model, &table()).unwrap();
        assert!(outcome.fitted);
        assert_eq!(outcome.eligible_rows, 2);
        assert_eq!(outcome.labels, vec![None, Some(0), None, Some(1)]);
        assert_eq!(outcome.labeled_rows(), 2);
    }

    #[test]
    fn test_skip_when_too_few_rows() {
        let model = RowCounter {
            columns: vec!["x".into()],
            min_rows: 3,
        };
        let outcome = label_table(&model, &table()).unwrap();
        assert!(!outcome.fitted);
        assert_eq!(outcome.labels, vec![None; 4]);
    }

    #[test]
    fn test_unknown_column_is_error() {
        let model = RowCounter {
            columns: vec!["vol_20".into()],
            min_rows: 1,
        };
        assert!(matches!(
            label_table(&model, &table()),
            Err(Error::MissingColumn(_))
        ));
    }
}
